use crate::codec::Command;
use crate::error::{CoolerError, Result};
use std::fmt;
use std::str::FromStr;

// Mnemonics understood by the controller
const STATUS: &str = "STATUS";
const ERROR: &str = "ERROR";
const VERSION: &str = "VERSION";
const COLD_HEAD_TEMP: &str = "TC";
const REJECT_TEMP: &str = "TEMP RJ";
const TARGET_TEMP: &str = "TTARGET";
const MEASURED_POWER: &str = "P";
const COMMANDED_POWER: &str = "PWOUT";
const POWER_LIMITS: &str = "E";
const COOLER: &str = "COOLER";

/// Index of the current commanded power among the `E` reply's value lines
/// (max power, min power, current commanded power).
pub const CURRENT_COMMANDED_POWER_LINE: usize = 2;

/// How a reply to a given command is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// One value line after the echo
    Scalar,
    /// Every line after the echo, until the controller goes quiet
    Lines,
}

/// Cryocooler controller commands
#[derive(Debug, Clone, PartialEq)]
pub enum CoolerCommand {
    /// Multi-line status dump
    Status,
    /// Last error reported by the controller
    Error,
    /// Firmware version
    Version,
    /// Cold head temperature (K)
    ColdHeadTemp,
    /// Reject (heat sink) temperature (°C)
    RejectTemp,
    /// Target temperature (K)
    TargetTemp,
    /// Set target temperature (K)
    SetTargetTemp(f64),
    /// Measured input power (W)
    MeasuredPower,
    /// Commanded power (W)
    CommandedPower,
    /// Set commanded power (W)
    SetCommandedPower(f64),
    /// Power limits block; its third value is the current commanded power
    PowerLimits,
    /// Start the cooler
    CoolerOn,
    /// Stop the cooler
    CoolerOff,
}

impl CoolerCommand {
    /// Wire command for this operation
    pub fn command(&self) -> Command {
        match self {
            CoolerCommand::Status => Command::query(STATUS),
            CoolerCommand::Error => Command::query(ERROR),
            CoolerCommand::Version => Command::query(VERSION),
            CoolerCommand::ColdHeadTemp => Command::query(COLD_HEAD_TEMP),
            CoolerCommand::RejectTemp => Command::query(REJECT_TEMP),
            CoolerCommand::TargetTemp => Command::query(TARGET_TEMP),
            CoolerCommand::SetTargetTemp(kelvin) => Command::with_decimal(TARGET_TEMP, *kelvin),
            CoolerCommand::MeasuredPower => Command::query(MEASURED_POWER),
            CoolerCommand::CommandedPower => Command::query(COMMANDED_POWER),
            CoolerCommand::SetCommandedPower(watts) => {
                Command::with_decimal(COMMANDED_POWER, *watts)
            }
            CoolerCommand::PowerLimits => Command::query(POWER_LIMITS),
            CoolerCommand::CoolerOn => Command::with_keyword(COOLER, "ON"),
            CoolerCommand::CoolerOff => Command::with_keyword(COOLER, "OFF"),
        }
    }

    pub const fn reply_shape(&self) -> ReplyShape {
        match self {
            CoolerCommand::Status | CoolerCommand::PowerLimits => ReplyShape::Lines,
            _ => ReplyShape::Scalar,
        }
    }

    /// Check this command's argument against `limits`
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        match self {
            CoolerCommand::SetTargetTemp(kelvin) => limits.check_target_temp(*kelvin),
            CoolerCommand::SetCommandedPower(watts) => limits.check_commanded_power(*watts),
            _ => Ok(()),
        }
    }

    /// Whether the command changes controller state
    pub const fn is_write_operation(&self) -> bool {
        matches!(
            self,
            CoolerCommand::SetTargetTemp(_)
                | CoolerCommand::SetCommandedPower(_)
                | CoolerCommand::CoolerOn
                | CoolerCommand::CoolerOff
        )
    }
}

/// Argument ranges accepted by the controller
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub min_target_temp_k: f64,
    pub max_target_temp_k: f64,
    pub min_commanded_power_w: f64,
    pub max_commanded_power_w: f64,
}

impl Limits {
    pub const MIN_TARGET_TEMP_K: f64 = 10.0;
    pub const MAX_TARGET_TEMP_K: f64 = 400.0;
    pub const MIN_COMMANDED_POWER_W: f64 = 0.0;
    pub const MAX_COMMANDED_POWER_W: f64 = 240.0;

    /// Create limits with validation
    pub fn new(
        target_temp_k: (f64, f64),
        commanded_power_w: (f64, f64),
    ) -> Result<Self> {
        let ordered = |(lo, hi): (f64, f64)| lo.is_finite() && hi.is_finite() && lo <= hi;
        if !ordered(target_temp_k) || !ordered(commanded_power_w) {
            return Err(CoolerError::InvalidArgument(
                "limits must be finite with min <= max".into(),
            ));
        }
        Ok(Self {
            min_target_temp_k: target_temp_k.0,
            max_target_temp_k: target_temp_k.1,
            min_commanded_power_w: commanded_power_w.0,
            max_commanded_power_w: commanded_power_w.1,
        })
    }

    pub fn check_target_temp(&self, kelvin: f64) -> Result<()> {
        check_range(
            "target temperature",
            kelvin,
            "K",
            self.min_target_temp_k,
            self.max_target_temp_k,
        )
    }

    pub fn check_commanded_power(&self, watts: f64) -> Result<()> {
        check_range(
            "commanded power",
            watts,
            "W",
            self.min_commanded_power_w,
            self.max_commanded_power_w,
        )
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_target_temp_k: Self::MIN_TARGET_TEMP_K,
            max_target_temp_k: Self::MAX_TARGET_TEMP_K,
            min_commanded_power_w: Self::MIN_COMMANDED_POWER_W,
            max_commanded_power_w: Self::MAX_COMMANDED_POWER_W,
        }
    }
}

fn check_range(name: &str, value: f64, unit: &str, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CoolerError::InvalidArgument(format!(
            "{name} {value} {unit} outside {min}-{max} {unit}"
        )))
    }
}

/// Scalar telemetry items readable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    ColdHeadTemp,
    RejectTemp,
    TargetTemp,
    MeasuredPower,
    CommandedPower,
    CurrentCommandedPower,
}

impl Item {
    pub const ALL: [Item; 6] = [
        Item::ColdHeadTemp,
        Item::RejectTemp,
        Item::TargetTemp,
        Item::MeasuredPower,
        Item::CommandedPower,
        Item::CurrentCommandedPower,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Item::ColdHeadTemp => "cold_head_temp",
            Item::RejectTemp => "reject_temp",
            Item::TargetTemp => "target_temp",
            Item::MeasuredPower => "measured_power",
            Item::CommandedPower => "commanded_power",
            Item::CurrentCommandedPower => "current_commanded_power",
        }
    }

    pub const fn unit(&self) -> &'static str {
        match self {
            Item::ColdHeadTemp | Item::TargetTemp => "K",
            Item::RejectTemp => "°C",
            Item::MeasuredPower | Item::CommandedPower | Item::CurrentCommandedPower => "W",
        }
    }
}

impl FromStr for Item {
    type Err = CoolerError;

    fn from_str(s: &str) -> Result<Self> {
        Item::ALL
            .into_iter()
            .find(|item| item.name() == s.trim())
            .ok_or_else(|| CoolerError::InvalidArgument(format!("Unknown item: {s}")))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
