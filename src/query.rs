use crate::cooler::Cryocooler;
use crate::device::Item;
use crate::error::Result;
use crate::transport::Transport;
use chrono::{DateTime, Utc};

/// One pass over every telemetry item. A field is `None` when the
/// controller did not answer that request in time.
#[derive(Debug, Clone, PartialEq)]
pub struct CoolerSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cold_head_temp: Option<f64>,
    pub reject_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub measured_power: Option<f64>,
    pub commanded_power: Option<f64>,
    pub current_commanded_power: Option<f64>,
}

impl CoolerSnapshot {
    pub fn get(&self, item: Item) -> Option<f64> {
        match item {
            Item::ColdHeadTemp => self.cold_head_temp,
            Item::RejectTemp => self.reject_temp,
            Item::TargetTemp => self.target_temp,
            Item::MeasuredPower => self.measured_power,
            Item::CommandedPower => self.commanded_power,
            Item::CurrentCommandedPower => self.current_commanded_power,
        }
    }

    /// Number of items that came back with a value
    pub fn answered(&self) -> usize {
        Item::ALL
            .iter()
            .filter(|item| self.get(**item).is_some())
            .count()
    }
}

/// Read every [`Item`] in turn.
///
/// Stops at the first error: a broken link or an undecodable reply makes the
/// rest of the pass meaningless.
pub async fn query_snapshot<T: Transport>(cooler: &mut Cryocooler<T>) -> Result<CoolerSnapshot> {
    let timestamp = Utc::now();
    Ok(CoolerSnapshot {
        timestamp,
        cold_head_temp: cooler.read_item(Item::ColdHeadTemp).await?,
        reject_temp: cooler.read_item(Item::RejectTemp).await?,
        target_temp: cooler.read_item(Item::TargetTemp).await?,
        measured_power: cooler.read_item(Item::MeasuredPower).await?,
        commanded_power: cooler.read_item(Item::CommandedPower).await?,
        current_commanded_power: cooler.read_item(Item::CurrentCommandedPower).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_answered() {
        let snapshot = CoolerSnapshot {
            timestamp: Utc::now(),
            cold_head_temp: Some(77.0),
            reject_temp: Some(31.5),
            target_temp: None,
            measured_power: Some(120.0),
            commanded_power: None,
            current_commanded_power: None,
        };
        assert_eq!(snapshot.get(Item::RejectTemp), Some(31.5));
        assert_eq!(snapshot.get(Item::TargetTemp), None);
        assert_eq!(snapshot.answered(), 3);
    }
}
