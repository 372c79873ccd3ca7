//! Read-only division/district table and order code generation.
//!
//! The table is built once at startup and never mutated; lookups are by
//! division name. Order codes are `<division prefix><zero-padded sequence>`,
//! e.g. `DH007`, with a fixed `XX` prefix for anything unrecognized so code
//! generation can never fail.

use serde::Serialize;
use std::collections::HashMap;

/// Prefix used for order codes when the division is not in the table.
pub const UNKNOWN_REGION_PREFIX: &str = "XX";

/// Width of the zero-padded sequence part of an order code.
const CODE_SEQUENCE_WIDTH: usize = 3;

/// A division with its districts, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub name: String,
    /// Fixed-width code used as the order code prefix.
    pub prefix: String,
    pub districts: Vec<String>,
}

/// The divisions of Bangladesh with their districts.
const BUILTIN_REGIONS: &[(&str, &str, &[&str])] = &[
    (
        "Dhaka",
        "DH",
        &[
            "Dhaka",
            "Faridpur",
            "Gazipur",
            "Gopalganj",
            "Kishoreganj",
            "Madaripur",
            "Manikganj",
            "Munshiganj",
            "Narayanganj",
            "Narsingdi",
            "Rajbari",
            "Shariatpur",
            "Tangail",
        ],
    ),
    (
        "Chattogram",
        "CT",
        &[
            "Bandarban",
            "Brahmanbaria",
            "Chandpur",
            "Chattogram",
            "Cox's Bazar",
            "Cumilla",
            "Feni",
            "Khagrachhari",
            "Lakshmipur",
            "Noakhali",
            "Rangamati",
        ],
    ),
    (
        "Rajshahi",
        "RJ",
        &[
            "Bogura",
            "Chapainawabganj",
            "Joypurhat",
            "Naogaon",
            "Natore",
            "Pabna",
            "Rajshahi",
            "Sirajganj",
        ],
    ),
    (
        "Khulna",
        "KH",
        &[
            "Bagerhat",
            "Chuadanga",
            "Jashore",
            "Jhenaidah",
            "Khulna",
            "Kushtia",
            "Magura",
            "Meherpur",
            "Narail",
            "Satkhira",
        ],
    ),
    (
        "Barishal",
        "BR",
        &[
            "Barguna",
            "Barishal",
            "Bhola",
            "Jhalokathi",
            "Patuakhali",
            "Pirojpur",
        ],
    ),
    (
        "Sylhet",
        "SY",
        &["Habiganj", "Moulvibazar", "Sunamganj", "Sylhet"],
    ),
    (
        "Rangpur",
        "RN",
        &[
            "Dinajpur",
            "Gaibandha",
            "Kurigram",
            "Lalmonirhat",
            "Nilphamari",
            "Panchagarh",
            "Rangpur",
            "Thakurgaon",
        ],
    ),
    (
        "Mymensingh",
        "MY",
        &["Jamalpur", "Mymensingh", "Netrokona", "Sherpur"],
    ),
];

/// Immutable division/district lookup table.
pub struct RegionTable {
    regions: Vec<Region>,
    index: HashMap<String, usize>,
}

impl RegionTable {
    /// Build the table from the built-in division list.
    pub fn builtin() -> Self {
        let regions: Vec<Region> = BUILTIN_REGIONS
            .iter()
            .map(|(name, prefix, districts)| Region {
                name: name.to_string(),
                prefix: prefix.to_string(),
                districts: districts.iter().map(|d| d.to_string()).collect(),
            })
            .collect();

        let index = regions
            .iter()
            .enumerate()
            .map(|(i, region)| (region.name.clone(), i))
            .collect();

        Self { regions, index }
    }

    /// All divisions, in display order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.index.get(name).map(|&i| &self.regions[i])
    }

    /// Districts of a division, in display order.
    pub fn districts_of(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(|region| region.districts.as_slice())
    }

    pub fn prefix_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|region| region.prefix.as_str())
    }

    /// Generate an order code for a division and sequence number.
    ///
    /// An unrecognized division falls back to the `XX` prefix rather than
    /// failing.
    pub fn order_code(&self, region: &str, sequence: u32) -> String {
        let prefix = self.prefix_of(region).unwrap_or(UNKNOWN_REGION_PREFIX);
        format!("{}{:0width$}", prefix, sequence, width = CODE_SEQUENCE_WIDTH)
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::builtin()
    }
}
