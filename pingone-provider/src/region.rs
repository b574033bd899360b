//! Region binding
//!
//! Single source of truth for regional identity: the user-facing region
//! name, the platform's region enum and the host-name suffix.

use std::sync::LazyLock;

/// A platform deployment region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// User-facing name (e.g., "NorthAmerica")
    pub name: &'static str,
    /// Platform enum value (e.g., "NA")
    pub api_code: &'static str,
    /// Host-name tail (e.g., "com" for api.pingone.com)
    pub suffix: &'static str,
    pub selectable: bool,
}

impl Region {
    /// Host for a platform service in this region, e.g. `api.pingone.eu`
    pub fn host(&self, service: &str) -> String {
        format!("{}.pingone.{}", service, self.suffix)
    }
}

/// Immutable region table
#[derive(Debug)]
pub struct RegionTable {
    regions: Vec<Region>,
}

static BUILTIN: LazyLock<RegionTable> = LazyLock::new(|| RegionTable {
    regions: vec![
        Region {
            name: "NorthAmerica",
            api_code: "NA",
            suffix: "com",
            selectable: true,
        },
        Region {
            name: "Europe",
            api_code: "EU",
            suffix: "eu",
            selectable: true,
        },
        Region {
            name: "AsiaPacific",
            api_code: "AP",
            suffix: "asia",
            selectable: true,
        },
        Region {
            name: "Canada",
            api_code: "CA",
            suffix: "ca",
            selectable: true,
        },
        Region {
            name: "Australia",
            api_code: "AU",
            suffix: "com.au",
            selectable: true,
        },
        Region {
            name: "Singapore",
            api_code: "SG",
            suffix: "sg",
            selectable: true,
        },
    ],
});

impl RegionTable {
    /// The platform's regions, initialised once
    pub fn builtin() -> &'static RegionTable {
        &BUILTIN
    }

    /// Names compare case-sensitively
    pub fn by_name(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// API codes are uppercase; lowercase input is accepted
    pub fn by_api_code(&self, code: &str) -> Option<&Region> {
        let code = code.to_ascii_uppercase();
        self.regions.iter().find(|r| r.api_code == code)
    }

    /// Name first, then API code
    pub fn resolve(&self, name_or_code: &str) -> Option<&Region> {
        self.by_name(name_or_code)
            .or_else(|| self.by_api_code(name_or_code))
    }

    /// Selectable region names in table order
    pub fn selectable_names(&self) -> Vec<&'static str> {
        self.regions
            .iter()
            .filter(|r| r.selectable)
            .map(|r| r.name)
            .collect()
    }

    pub fn all(&self) -> &[Region] {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectable_regions_round_trip() {
        let table = RegionTable::builtin();
        for name in table.selectable_names() {
            let region = table.by_name(name).unwrap();
            assert_eq!(table.by_api_code(region.api_code).unwrap().name, name);
            assert_eq!(
                table.by_name(region.name).unwrap().api_code,
                region.api_code
            );
        }
    }

    #[test]
    fn builtin_table_is_unique() {
        let regions = RegionTable::builtin().all();
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.api_code, b.api_code);
                assert_ne!(a.suffix, b.suffix);
            }
        }
    }

    #[test]
    fn names_are_case_sensitive_codes_are_not() {
        let table = RegionTable::builtin();
        assert!(table.by_name("northamerica").is_none());
        assert_eq!(table.by_api_code("eu").unwrap().name, "Europe");
        assert_eq!(table.resolve("CA").unwrap().name, "Canada");
        assert!(table.by_api_code("XX").is_none());
    }

    #[test]
    fn host_uses_suffix() {
        let table = RegionTable::builtin();
        assert_eq!(table.by_name("Australia").unwrap().host("api"), "api.pingone.com.au");
        assert_eq!(table.by_name("NorthAmerica").unwrap().host("auth"), "auth.pingone.com");
    }
}
