//! Product catalog
//!
//! Maps the service codes users write in the `service` block to the
//! platform's product enum.

use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    /// User-facing code (e.g., "SSO")
    pub code: &'static str,
    /// Platform enum value (e.g., "PING_ONE_BASE")
    pub api_code: &'static str,
    /// Platform-internal products are never offered for selection
    pub selectable: bool,
    /// Whether the product carries a console URL and bookmarks
    pub has_console: bool,
}

const fn product(code: &'static str, api_code: &'static str, has_console: bool) -> Product {
    Product {
        code,
        api_code,
        selectable: true,
        has_console,
    }
}

const fn internal(code: &'static str, api_code: &'static str) -> Product {
    Product {
        code,
        api_code,
        selectable: false,
        has_console: false,
    }
}

/// Immutable product table
#[derive(Debug)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

static BUILTIN: LazyLock<ProductCatalog> = LazyLock::new(|| ProductCatalog {
    products: vec![
        product("SSO", "PING_ONE_BASE", false),
        product("MFA", "PING_ONE_MFA", false),
        product("Risk", "PING_ONE_RISK", false),
        product("Verify", "PING_ONE_VERIFY", false),
        product("Credentials", "PING_ONE_CREDENTIALS", false),
        product("APIIntelligence", "PING_INTELLIGENCE", false),
        product("Authorize", "PING_ONE_AUTHORIZE", false),
        product("Fraud", "PING_ONE_FRAUD", false),
        product("DaVinci", "PING_ONE_DAVINCI", false),
        product("PingID", "PING_ID", true),
        product("PingFederate", "PING_FEDERATE", true),
        product("PingAccess", "PING_ACCESS", true),
        product("PingDirectory", "PING_DIRECTORY", true),
        product("PingAuthorize", "PING_AUTHORIZE", true),
        product("PingCentral", "PING_CENTRAL", true),
        internal("SSOProvisioning", "PING_ONE_PROVISIONING"),
        internal("PingOneID", "PING_ONE_ID"),
    ],
});

impl ProductCatalog {
    pub fn builtin() -> &'static ProductCatalog {
        &BUILTIN
    }

    pub fn by_product_code(&self, code: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.code == code)
    }

    pub fn by_api_code(&self, api_code: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.api_code == api_code)
    }

    /// Codes accepted on write, in table order
    pub fn selectable_product_codes(&self) -> Vec<&'static str> {
        self.products
            .iter()
            .filter(|p| p.selectable)
            .map(|p| p.code)
            .collect()
    }

    pub fn all(&self) -> &[Product] {
        &self.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectable_products_round_trip() {
        let catalog = ProductCatalog::builtin();
        for code in catalog.selectable_product_codes() {
            let product = catalog.by_product_code(code).unwrap();
            assert_eq!(catalog.by_api_code(product.api_code).unwrap().code, code);
        }
    }

    #[test]
    fn codes_are_unique() {
        let catalog = ProductCatalog::builtin();
        for (i, a) in catalog.all().iter().enumerate() {
            for b in &catalog.all()[i + 1..] {
                assert_ne!(a.code, b.code);
                assert_ne!(a.api_code, b.api_code);
            }
        }
    }

    #[test]
    fn internal_products_resolve_but_are_not_selectable() {
        let catalog = ProductCatalog::builtin();
        let provisioning = catalog.by_api_code("PING_ONE_PROVISIONING").unwrap();
        assert!(!provisioning.selectable);
        assert!(
            !catalog
                .selectable_product_codes()
                .contains(&provisioning.code)
        );
    }

    #[test]
    fn sso_is_the_base_product() {
        let catalog = ProductCatalog::builtin();
        assert_eq!(catalog.by_product_code("SSO").unwrap().api_code, "PING_ONE_BASE");
        assert!(catalog.by_product_code("sso").is_none());
    }
}
