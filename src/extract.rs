use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

// One pattern per field. Each value sits in a <code> element on the line
// after its <strong> label, so `.` never crosses into the next field.
static MAPPER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ROM Bank</strong>\n\s*<code>(.*)</code>").unwrap());
static SHA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SHA-1</strong>\n\s*<code>(.*)</code>").unwrap());
static ROM_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ROM Size</strong>\n\s*<code>(.*) Mb</code>").unwrap());
static RAM_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SRAM Size</strong>\n\s*<code>(.*) Kb</code>").unwrap());
static ROM_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ROM type</strong>\n\s*<code>(.*)</code>").unwrap());
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Country</strong>\n\s*<code>(.*)</code>").unwrap());

/// Hardware configuration of one cartridge variant. Field names follow the
/// emitted JSON document; the SHA-1 checksum is the map key, not a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cartridge {
    #[serde(rename = "Mapper")]
    pub mapper: String,
    #[serde(rename = "ROMType")]
    pub rom_type: String,
    /// Megabits.
    #[serde(rename = "ROMSize")]
    pub rom_size: u32,
    /// Kilobits; 0 when the page lists no SRAM for this variant.
    #[serde(rename = "RAMSize")]
    pub ram_size: u32,
    #[serde(rename = "Region")]
    pub region: String,
}

/// What to do when a page has more checksums than mapper entries.
///
/// The site leaves the mapper column blank for carts with unlisted ROM
/// information, so this genuinely happens. `StopPage` drops the short
/// checksum and everything after it on the page; `SkipRecord` drops only
/// the checksums that lack a mapper entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MismatchPolicy {
    StopPage,
    SkipRecord,
}

/// Outcome of extracting one detail page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    /// (checksum, cartridge) pairs in page order.
    pub records: Vec<(String, Cartridge)>,
    /// Records dropped for a short or unparseable non-RAM field.
    pub skipped: usize,
    /// Checksums abandoned when `StopPage` cut the page short.
    pub truncated: usize,
}

/// Run all six field patterns over one detail page and align the match lists
/// positionally: the Nth checksum pairs with the Nth entry of every other
/// list. A page lists several variants when a title shipped in more than one
/// region. The checksum list drives iteration; only SRAM may legitimately be
/// missing, and it defaults to 0.
pub fn extract_cartridges(html: &str, policy: MismatchPolicy) -> PageExtraction {
    let mappers = capture_all(&MAPPER_RE, html);
    let shas = capture_all(&SHA_RE, html);
    let rom_sizes = capture_all(&ROM_SIZE_RE, html);
    let ram_sizes = capture_all(&RAM_SIZE_RE, html);
    let rom_types = capture_all(&ROM_TYPE_RE, html);
    let regions = capture_all(&REGION_RE, html);

    let mut page = PageExtraction::default();

    for (idx, sha) in shas.iter().enumerate() {
        if idx >= mappers.len() {
            match policy {
                MismatchPolicy::StopPage => {
                    page.truncated = shas.len() - idx;
                    break;
                }
                MismatchPolicy::SkipRecord => {
                    page.skipped += 1;
                    continue;
                }
            }
        }

        // The mapper gate passed, so the remaining lists should reach idx
        // too. When one doesn't, the page layout has drifted under us; drop
        // the record rather than mis-align the rest.
        let (Some(rom_type), Some(rom_size), Some(region)) =
            (rom_types.get(idx), rom_sizes.get(idx), regions.get(idx))
        else {
            warn!("variant {} ({}): field list shorter than checksum list", idx, sha);
            page.skipped += 1;
            continue;
        };

        let Some(rom_size) = parse_size(rom_size) else {
            warn!("variant {} ({}): unparseable ROM size `{}`", idx, sha, rom_size);
            page.skipped += 1;
            continue;
        };

        let ram_size = match ram_sizes.get(idx) {
            Some(raw) => match parse_size(raw) {
                Some(kb) => kb,
                None => {
                    warn!("variant {} ({}): unparseable SRAM size `{}`", idx, sha, raw);
                    page.skipped += 1;
                    continue;
                }
            },
            None => 0,
        };

        page.records.push((
            sha.clone(),
            Cartridge {
                mapper: mappers[idx].clone(),
                rom_type: rom_type.clone(),
                rom_size,
                ram_size,
                region: region.clone(),
            },
        ));
    }

    page
}

fn capture_all(re: &Regex, html: &str) -> Vec<String> {
    re.captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn parse_size(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn two_variants_one_sram_entry() {
        let page = extract_cartridges(&fixture("actraiser"), MismatchPolicy::StopPage);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.skipped, 0);
        assert_eq!(page.truncated, 0);

        let (sha, usa) = &page.records[0];
        assert_eq!(sha, "65425e6e0bcd4e4bc6dd9dbf5f2059d98e1dbbd8");
        assert_eq!(usa.mapper, "LoROM");
        assert_eq!(usa.rom_type, "ROM+RAM+BAT");
        assert_eq!(usa.rom_size, 4);
        assert_eq!(usa.ram_size, 16);
        assert_eq!(usa.region, "USA");

        // Second variant has no SRAM row: defaults to 0.
        let (_, japan) = &page.records[1];
        assert_eq!(japan.rom_size, 8);
        assert_eq!(japan.ram_size, 0);
        assert_eq!(japan.region, "Japan");
    }

    #[test]
    fn short_mapper_list_stops_page() {
        let page = extract_cartridges(&fixture("short_mappers"), MismatchPolicy::StopPage);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.truncated, 2);
        assert_eq!(page.skipped, 0);
    }

    #[test]
    fn short_mapper_list_skip_record_policy() {
        let page = extract_cartridges(&fixture("short_mappers"), MismatchPolicy::SkipRecord);
        // Parallel lists: the checksums past the mapper list can never
        // recover a mapper, so both policies emit the same single record.
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.skipped, 2);
        assert_eq!(page.truncated, 0);
    }

    #[test]
    fn short_region_list_skips_only_that_record() {
        // Two full variants except the second has no Country row.
        let html = "\
<strong>SHA-1</strong>\n  <code>aaaa</code>\n\
<strong>ROM Bank</strong>\n  <code>LoROM</code>\n\
<strong>ROM type</strong>\n  <code>ROM</code>\n\
<strong>ROM Size</strong>\n  <code>4 Mb</code>\n\
<strong>Country</strong>\n  <code>USA</code>\n\
<strong>SHA-1</strong>\n  <code>bbbb</code>\n\
<strong>ROM Bank</strong>\n  <code>HiROM</code>\n\
<strong>ROM type</strong>\n  <code>ROM</code>\n\
<strong>ROM Size</strong>\n  <code>8 Mb</code>\n";
        let page = extract_cartridges(html, MismatchPolicy::StopPage);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].0, "aaaa");
        assert_eq!(page.skipped, 1);
    }

    #[test]
    fn page_without_cartridge_tables() {
        let page = extract_cartridges("<html><body>nothing here</body></html>", MismatchPolicy::StopPage);
        assert!(page.records.is_empty());
        assert_eq!(page.skipped, 0);
        assert_eq!(page.truncated, 0);
    }

    #[test]
    fn label_match_is_case_insensitive() {
        let html = "\
<strong>sha-1</strong>\n<code>cccc</code>\n\
<strong>rom bank</strong>\n<code>LoROM</code>\n\
<strong>rom type</strong>\n<code>ROM</code>\n\
<strong>rom size</strong>\n<code>2 Mb</code>\n\
<strong>country</strong>\n<code>Europe</code>\n";
        let page = extract_cartridges(html, MismatchPolicy::StopPage);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].1.region, "Europe");
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut db = BTreeMap::new();
        db.insert(
            "65425e6e0bcd4e4bc6dd9dbf5f2059d98e1dbbd8".to_string(),
            Cartridge {
                mapper: "LoROM".into(),
                rom_type: "ROM+RAM+BAT".into(),
                rom_size: 4,
                ram_size: 16,
                region: "USA".into(),
            },
        );
        db.insert(
            "0902dca1969a36a2566fbe74d2aca4c51c82cfa4".to_string(),
            Cartridge {
                mapper: "HiROM".into(),
                rom_type: "ROM".into(),
                rom_size: 32,
                ram_size: 0,
                region: "Japan".into(),
            },
        );

        let json = serde_json::to_string_pretty(&db).unwrap();
        let parsed: BTreeMap<String, Cartridge> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, db);

        // Key names the emulator looks up.
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entry = &value["65425e6e0bcd4e4bc6dd9dbf5f2059d98e1dbbd8"];
        assert_eq!(entry["Mapper"], "LoROM");
        assert_eq!(entry["ROMType"], "ROM+RAM+BAT");
        assert_eq!(entry["ROMSize"], 4);
        assert_eq!(entry["RAMSize"], 16);
        assert_eq!(entry["Region"], "USA");
    }
}
