use clap::ValueEnum;

use crate::scenarios::Scenario;

pub(crate) fn run() {
    for scenario in Scenario::value_variants() {
        if let Some(value) = scenario.to_possible_value() {
            println!(
                "{:<12} {}",
                value.get_name(),
                value.get_help().map(ToString::to_string).unwrap_or_default()
            );
        }
    }
}
