use crate::gateways::error::GatewayResult;
use crate::gateways::gateway::CallbackGateway;
use crate::gateways::momo::{MomoConfig, MomoGateway};
use crate::gateways::types::ProviderName;
use crate::gateways::vnpay::{VnpayConfig, VnpayGateway};
use crate::gateways::zalopay::{ZalopayConfig, ZalopayGateway};

/// Holds one gateway per supported provider and hands them out by name.
pub struct GatewayRegistry {
    momo: MomoGateway,
    vnpay: VnpayGateway,
    zalopay: ZalopayGateway,
}

impl GatewayRegistry {
    pub fn new(momo: MomoConfig, vnpay: VnpayConfig, zalopay: ZalopayConfig) -> Self {
        Self {
            momo: MomoGateway::new(momo),
            vnpay: VnpayGateway::new(vnpay),
            zalopay: ZalopayGateway::new(zalopay),
        }
    }

    pub fn from_env() -> GatewayResult<Self> {
        Ok(Self::new(
            MomoConfig::from_env()?,
            VnpayConfig::from_env()?,
            ZalopayConfig::from_env()?,
        ))
    }

    pub fn get(&self, provider: ProviderName) -> &dyn CallbackGateway {
        match provider {
            ProviderName::Momo => &self.momo,
            ProviderName::Vnpay => &self.vnpay,
            ProviderName::Zalopay => &self.zalopay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> GatewayRegistry {
        GatewayRegistry::new(
            MomoConfig {
                partner_code: "GLOWCART".to_string(),
                access_key: "ak".to_string(),
                secret_key: "sk".to_string(),
            },
            VnpayConfig {
                tmn_code: "GLOWCART1".to_string(),
                hash_secret: "hs".to_string(),
            },
            ZalopayConfig {
                app_id: "553".to_string(),
                key2: "k2".to_string(),
            },
        )
    }

    #[test]
    fn registry_returns_matching_gateway() {
        let registry = registry();
        for provider in [ProviderName::Momo, ProviderName::Vnpay, ProviderName::Zalopay] {
            assert_eq!(registry.get(provider).name(), provider);
        }
    }
}
