//! Unit tests for forward parsing and tier merging.

use super::*;
use rstest::rstest;

fn set(groups: &[(&str, &[(u16, u16)])]) -> PortForwardSet {
    let mut result = PortForwardSet::new();
    for (name, pairs) in groups {
        result.insert_group(
            *name,
            pairs
                .iter()
                .map(|(from, to)| PortForward::new(*from, *to))
                .collect(),
        );
    }
    result
}

#[rstest]
#[case("80:8080", PortForward::new(80, 8080))]
#[case(" 5432 : 5433 ", PortForward::new(5432, 5433))]
fn parses_from_to_pairs(#[case] input: &str, #[case] expected: PortForward) {
    assert_eq!(input.parse::<PortForward>(), Ok(expected));
}

#[rstest]
#[case("8080", ForwardParseError::MissingSeparator { value: String::from("8080") })]
#[case("abc:80", ForwardParseError::InvalidPort { value: String::from("abc") })]
#[case("80:70000", ForwardParseError::InvalidPort { value: String::from("70000") })]
#[case("0:80", ForwardParseError::InvalidPort { value: String::from("0") })]
fn rejects_malformed_pairs(#[case] input: &str, #[case] expected: ForwardParseError) {
    assert_eq!(input.parse::<PortForward>(), Err(expected));
}

#[rstest]
fn later_tier_replaces_group_in_original_position() {
    let config = set(&[("web", &[(80, 80)]), ("db", &[(5432, 5432)])]);
    let cli = set(&[("web", &[(8080, 80)]), ("extra", &[(9000, 9000)])]);

    let merged = config.merged(cli);

    let names: Vec<_> = merged.groups().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["web", "db", "extra"]);
    let forwards: Vec<_> = merged.iter().copied().collect();
    assert_eq!(
        forwards,
        [
            PortForward::new(8080, 80),
            PortForward::new(5432, 5432),
            PortForward::new(9000, 9000),
        ]
    );
}

#[rstest]
fn defaults_are_empty() {
    assert!(PortForwardSet::defaults().is_empty());
}

#[rstest]
fn cli_tier_uses_single_named_group() {
    let cli = PortForwardSet::from_cli(&[PortForward::new(1, 2), PortForward::new(3, 4)]);

    assert_eq!(cli.groups().len(), 1);
    assert_eq!(
        cli.groups().first().map(|g| g.name.as_str()),
        Some(CLI_GROUP_NAME)
    );
    assert!(PortForwardSet::from_cli(&[]).groups().is_empty());
}

#[rstest]
fn repeated_cli_source_port_keeps_last_destination() {
    let cli = PortForwardSet::from_cli(&[
        PortForward::new(80, 8080),
        PortForward::new(5432, 5432),
        PortForward::new(80, 9090),
    ]);

    assert_eq!(
        cli.iter().copied().collect::<Vec<_>>(),
        [PortForward::new(80, 9090), PortForward::new(5432, 5432)]
    );
}

#[rstest]
fn display_round_trips_cli_form() {
    assert_eq!(PortForward::new(80, 8080).to_string(), "80:8080");
}
