//! Experiment protocol table.
//!
//! Maps the experiment type names recorded in instrument files (for
//! example `TH-PI-IZZI+` or `MW-PI-C++`) to the classification family,
//! the treatment energy, the composite MagIC lab-protocol codes and the
//! checks the protocol is expected to contain.

use serde::Serialize;
use std::fmt;

/// Classification algorithm applied to a protocol's steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Family {
    /// Zero-field first, then in-field (ZI)
    Coe,
    /// In-field first, then zero-field (IZ)
    Aitken,
    /// Alternating IZ and ZI pairs
    Izzi,
    /// Thellier–Thellier: two antiparallel in-field steps
    Thellier,
    /// Perpendicular lab field method
    Perpendicular,
    /// Stepwise demagnetization without a lab field
    Demagnetization,
}

impl Family {
    /// Whether the family is a paleointensity protocol
    pub fn is_paleointensity(&self) -> bool {
        !matches!(self, Family::Demagnetization)
    }
}

/// Treatment energy of a protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Energy {
    Thermal,
    Microwave,
    AlternatingField,
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Energy::Thermal => write!(f, "thermal"),
            Energy::Microwave => write!(f, "microwave"),
            Energy::AlternatingField => write!(f, "AF"),
        }
    }
}

/// One row of the protocol table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolEntry {
    pub name: &'static str,
    pub family: Family,
    pub energy: Energy,
    pub method_codes: &'static str,
    pub expects_alteration_checks: bool,
    pub expects_md_checks: bool,
}

const fn entry(
    name: &'static str,
    family: Family,
    energy: Energy,
    method_codes: &'static str,
    expects_alteration_checks: bool,
    expects_md_checks: bool,
) -> ProtocolEntry {
    ProtocolEntry {
        name,
        family,
        energy,
        method_codes,
        expects_alteration_checks,
        expects_md_checks,
    }
}

use Energy::{AlternatingField as AF, Microwave as MW, Thermal as TH};
use Family::*;

static PROTOCOLS: &[ProtocolEntry] = &[
    entry("MW-PI-OT", Thellier, MW, "LP-PI-M:LP-PI-II:LP-PI-M-II", false, false),
    entry("MW-PI-OT+", Thellier, MW, "LP-PI-M:LP-PI-II:LP-PI-M-II:LP-PI-ALT-PMRM", true, false),
    entry("TH-PI-OT", Thellier, TH, "LP-PI-TRM:LP-PI-II:LP-PI-TRM-II", false, false),
    entry("TH-PI-OT+", Thellier, TH, "LP-PI-TRM:LP-PI-II:LP-PI-TRM-II:LP-PI-ALT-PTRM", true, false),
    entry("MW-PI-P", Perpendicular, MW, "LP-PI-M:LP-PI-M-PERP", false, false),
    entry("TH-PI-P", Perpendicular, TH, "LP-PI-TRM:LP-PI-TRM-PERP", false, false),
    entry("MW-PI-C", Coe, MW, "LP-PI-M:LP-PI-ZI:LP-PI-M-ZI", false, false),
    entry("MW-PI-C+", Coe, MW, "LP-PI-M:LP-PI-ZI:LP-PI-M-ZI:LP-PI-ALT-PMRM", true, false),
    entry("MW-PI-C++", Coe, MW, "LP-PI-M:LP-PI-ZI:LP-PI-M-ZI:LP-PI-ALT-PMRM:LP-PI-BT-MD", true, true),
    entry("MW-PI-IZZI", Izzi, MW, "LP-PI-M:LP-PI-BT-IZZI", false, false),
    entry("MW-PI-IZZI+", Izzi, MW, "LP-PI-M:LP-PI-BT-IZZI:LP-PI-ALT-PMRM", true, false),
    entry("MW-PI-IZZI++", Izzi, MW, "LP-PI-M:LP-PI-BT-IZZI:LP-PI-ALT-PMRM:LP-PI-BT-MD", true, true),
    entry("MW-PI-A", Aitken, MW, "LP-PI-M:LP-PI-IZ:LP-PI-M-IZ", false, false),
    entry("MW-PI-A+", Aitken, MW, "LP-PI-M:LP-PI-IZ:LP-PI-M-IZ:LP-PI-ALT-PMRM", true, false),
    entry("TH-PI-C", Coe, TH, "LP-PI-TRM:LP-PI-ZI:LP-PI-TRM-ZI", false, false),
    entry("TH-PI-C+", Coe, TH, "LP-PI-TRM:LP-PI-ZI:LP-PI-TRM-ZI:LP-PI-ALT-PTRM", true, false),
    entry("TH-PI-C++", Coe, TH, "LP-PI-TRM:LP-PI-ZI:LP-PI-TRM-ZI:LP-PI-ALT-PTRM:LP-PI-BT-MD", true, true),
    entry("TH-PI-IZZI", Izzi, TH, "LP-PI-TRM:LP-PI-BT-IZZI", false, false),
    entry("TH-PI-IZZI+", Izzi, TH, "LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM", true, false),
    entry("TH-PI-IZZI++", Izzi, TH, "LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM:LP-PI-BT-MD", true, true),
    entry("TH-PI-A", Aitken, TH, "LP-PI-TRM:LP-PI-IZ:LP-PI-TRM-IZ", false, false),
    entry("TH-PI-A+", Aitken, TH, "LP-PI-TRM:LP-PI-IZ:LP-PI-TRM-IZ:LP-PI-ALT-PTRM", true, false),
    entry("TH-D", Demagnetization, TH, "LP-DIR-T", false, false),
    entry("AF-D", Demagnetization, AF, "LP-DIR-AF", false, false),
    entry("MW-D", Demagnetization, MW, "LP-DIR-M", false, false),
];

/// Read-only lookup over the supported experiment types
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolTable;

impl ProtocolTable {
    /// Look up an experiment type by its exact name
    pub fn lookup(name: &str) -> Option<&'static ProtocolEntry> {
        PROTOCOLS.iter().find(|entry| entry.name == name.trim())
    }

    /// All supported entries, in table order
    pub fn entries() -> &'static [ProtocolEntry] {
        PROTOCOLS
    }

    pub fn is_supported(name: &str) -> bool {
        Self::lookup(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_protocols() {
        let izzi = ProtocolTable::lookup("TH-PI-IZZI+").unwrap();
        assert_eq!(izzi.family, Family::Izzi);
        assert_eq!(izzi.energy, Energy::Thermal);
        assert_eq!(izzi.method_codes, "LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM");
        assert!(izzi.expects_alteration_checks);
        assert!(!izzi.expects_md_checks);

        let coe = ProtocolTable::lookup("MW-PI-C++").unwrap();
        assert_eq!(coe.family, Family::Coe);
        assert_eq!(coe.energy, Energy::Microwave);
        assert!(coe.expects_md_checks);
    }

    #[test]
    fn test_lookup_rejects_unknown_names() {
        assert!(ProtocolTable::lookup("TH-PI-XYZ").is_none());
        assert!(ProtocolTable::lookup("th-pi-izzi").is_none());
        assert!(!ProtocolTable::is_supported(""));
    }

    #[test]
    fn test_names_are_unique() {
        let entries = ProtocolTable::entries();
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_energy_prefix_matches_name() {
        for entry in ProtocolTable::entries() {
            let expected = match entry.energy {
                Energy::Thermal => "TH-",
                Energy::Microwave => "MW-",
                Energy::AlternatingField => "AF-",
            };
            assert!(entry.name.starts_with(expected), "{}", entry.name);
        }
    }
}
