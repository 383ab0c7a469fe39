use serde::{Deserialize, Serialize};

/// Kind of TerraMA2-style service running the scheduler.
///
/// The snake case name doubles as the process log table prefix.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceType {
    #[default]
    Collector,
    Analysis,
    View,
    Alert,
    Interpolator,
}
