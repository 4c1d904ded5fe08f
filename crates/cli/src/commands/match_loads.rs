use std::str::FromStr;

use chrono::NaiveDate;
use freightdesk_core::desk::matching::{DateWindow, LoadRequirements};
use freightdesk_core::desk::DeskRuntime;
use freightdesk_core::domain::load::EquipmentType;

use crate::commands::{build_desk, load_config, CommandResult};

#[derive(Clone, Debug, Default)]
pub struct MatchArgs {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub equipment_type: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

pub fn run(args: MatchArgs) -> CommandResult {
    let config = match load_config("match") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let desk = match build_desk(&config) {
        Ok(desk) => desk,
        Err(error) => return CommandResult::failure("match", "desk_init", format!("{error:#}"), 4),
    };

    let equipment_type = match args.equipment_type.as_deref().map(EquipmentType::from_str).transpose() {
        Ok(equipment_type) => equipment_type,
        Err(error) => return CommandResult::failure("match", "invalid_input", error.to_string(), 2),
    };
    let requirements = LoadRequirements {
        origin: args.origin,
        destination: args.destination,
        equipment_type,
        pickup_window: args.pickup_date.map(DateWindow::on_day),
    };

    let loads = desk.search_loads(&requirements, args.limit);
    CommandResult::with_data("match", format!("{} matching loads", loads.len()), &loads)
}
