//! The per-stream channel descriptor table (`InfoChannel`).

use std::collections::HashMap;

use log::{debug, warn};
use mcsh5_format::data_read::decode_int;
use mcsh5_format::datatype::{CompoundMember, Datatype};

use crate::calibration::Calibration;
use crate::error::{Error, Result};
use crate::reader::Dataset;

/// One row of the descriptor table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel_id: i32,
    /// Row of this channel in the raw sample matrix.
    pub row_index: i32,
    pub group_id: i32,
    pub electrode_group: i32,
    /// Lookup key.
    pub label: String,
    pub raw_data_type: String,
    pub unit: String,
    pub exponent: i32,
    pub ad_zero: i32,
    /// Sampling interval in microseconds.
    pub tick: i64,
    pub conversion_factor: i64,
    pub adc_bits: i32,
    pub high_pass_filter_type: String,
    pub high_pass_filter_cutoff: String,
    pub high_pass_filter_order: i32,
    pub low_pass_filter_type: String,
    pub low_pass_filter_cutoff: String,
    pub low_pass_filter_order: i32,
}

impl ChannelRecord {
    /// Calibration constants of this channel.
    pub fn calibration(&self) -> Calibration {
        Calibration {
            ad_zero: self.ad_zero,
            conversion_factor: self.conversion_factor,
            exponent: self.exponent,
            tick: self.tick,
        }
    }
}

/// Channel records in table order plus a label index.
#[derive(Debug, Clone, Default)]
pub struct ChannelTable {
    records: Vec<ChannelRecord>,
    by_label: HashMap<String, usize>,
}

/// A located compound member.
struct Column<'a> {
    name: &'static str,
    member: Option<&'a CompoundMember>,
}

impl Column<'_> {
    fn slice<'r>(&self, record: &'r [u8]) -> Option<(&'r [u8], &Datatype)> {
        let member = self.member?;
        let start = usize::try_from(member.byte_offset).ok()?;
        record.get(start..).map(|bytes| (bytes, &member.datatype))
    }
}

impl ChannelTable {
    /// Build a table from records, indexing them by label.
    ///
    /// A repeated label keeps the last row that carries it.
    pub fn from_records(records: Vec<ChannelRecord>) -> ChannelTable {
        let mut by_label = HashMap::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            if let Some(previous) = by_label.insert(record.label.clone(), row) {
                warn!(
                    "duplicate channel label {:?} in rows {previous} and {row}; keeping row {row}",
                    record.label
                );
            }
        }
        ChannelTable { records, by_label }
    }

    /// Read the descriptor dataset in one pass.
    ///
    /// Fields are located by name, ignoring ASCII case. The dataset must be a
    /// one-dimensional compound with at least the calibration fields.
    pub fn read(dataset: &Dataset) -> Result<ChannelTable> {
        let path = dataset.path();
        let datatype = dataset.datatype();
        let members = datatype
            .compound_members()
            .ok_or_else(|| Error::Schema(format!("{path} is not a compound dataset")))?;
        let shape = dataset.shape();
        if shape.len() != 1 {
            return Err(Error::Schema(format!(
                "{path} has rank {}, expected 1",
                shape.len()
            )));
        }

        let column = |name: &'static str| Column {
            name,
            member: members.iter().find(|m| m.name.eq_ignore_ascii_case(name)),
        };
        let required = |name: &'static str| {
            let c = column(name);
            match c.member {
                Some(_) => Ok(c),
                None => Err(Error::Schema(format!("{path} has no {name} field"))),
            }
        };

        let channel_id = required("ChannelID")?;
        let row_index = required("RowIndex")?;
        let label = required("Label")?;
        let exponent = required("Exponent")?;
        let ad_zero = required("ADZero")?;
        let tick = required("Tick")?;
        let conversion_factor = required("ConversionFactor")?;
        let group_id = column("GroupID");
        let electrode_group = column("ElectrodeGroup");
        let raw_data_type = column("RawDataType");
        let unit = column("Unit");
        let adc_bits = column("ADCBits");
        let hp_type = column("HighPassFilterType");
        let hp_cutoff = column("HighPassFilterCutOffFrequency");
        let hp_order = column("HighPassFilterOrder");
        let lp_type = column("LowPassFilterType");
        let lp_cutoff = column("LowPassFilterCutOffFrequency");
        let lp_order = column("LowPassFilterOrder");

        let record_size = datatype.type_size() as usize;
        let raw = dataset.read_raw()?;
        debug!("{path}: {} channel records of {record_size} bytes", shape[0]);

        let int = |c: &Column<'_>, record: &[u8]| -> Result<i64> {
            match c.slice(record) {
                Some((bytes, dt)) => decode_int(bytes, dt)
                    .map_err(|e| Error::Schema(format!("{path}: field {}: {e}", c.name))),
                None => Ok(0),
            }
        };
        let int32 = |c: &Column<'_>, record: &[u8]| -> Result<i32> {
            let v = int(c, record)?;
            i32::try_from(v).map_err(|_| {
                Error::Schema(format!("{path}: field {} value {v} exceeds 32 bits", c.name))
            })
        };
        let text = |c: &Column<'_>, record: &[u8]| -> Result<String> {
            match c.slice(record) {
                Some((bytes, dt)) => dataset
                    .decode_string(bytes, dt)
                    .map_err(|e| Error::Schema(format!("{path}: field {}: {e}", c.name))),
                None => Ok(String::new()),
            }
        };

        let records = raw
            .chunks_exact(record_size.max(1))
            .take(usize::try_from(shape[0]).unwrap_or(usize::MAX))
            .map(|rec| {
                Ok(ChannelRecord {
                    channel_id: int32(&channel_id, rec)?,
                    row_index: int32(&row_index, rec)?,
                    group_id: int32(&group_id, rec)?,
                    electrode_group: int32(&electrode_group, rec)?,
                    label: text(&label, rec)?,
                    raw_data_type: text(&raw_data_type, rec)?,
                    unit: text(&unit, rec)?,
                    exponent: int32(&exponent, rec)?,
                    ad_zero: int32(&ad_zero, rec)?,
                    tick: int(&tick, rec)?,
                    conversion_factor: int(&conversion_factor, rec)?,
                    adc_bits: int32(&adc_bits, rec)?,
                    high_pass_filter_type: text(&hp_type, rec)?,
                    high_pass_filter_cutoff: text(&hp_cutoff, rec)?,
                    high_pass_filter_order: int32(&hp_order, rec)?,
                    low_pass_filter_type: text(&lp_type, rec)?,
                    low_pass_filter_cutoff: text(&lp_cutoff, rec)?,
                    low_pass_filter_order: int32(&lp_order, rec)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ChannelTable::from_records(records))
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no channels.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Table position of the channel with this exact label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.by_label.get(label).copied()
    }

    /// Record of the channel with this exact label.
    pub fn get(&self, label: &str) -> Option<&ChannelRecord> {
        self.index_of(label).map(|i| &self.records[i])
    }

    /// All records in table order.
    pub fn records(&self) -> &[ChannelRecord] {
        &self.records
    }

    /// Iterate over records in table order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChannelRecord> {
        self.records.iter()
    }

    /// Labels in table order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.label.as_str())
    }
}

impl<'a> IntoIterator for &'a ChannelTable {
    type Item = &'a ChannelRecord;
    type IntoIter = std::slice::Iter<'a, ChannelRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, row: i32) -> ChannelRecord {
        ChannelRecord {
            label: label.to_string(),
            row_index: row,
            ..ChannelRecord::default()
        }
    }

    #[test]
    fn exact_label_lookup() {
        let table =
            ChannelTable::from_records(vec![record("1", 0), record("2", 1), record("46", 2)]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_of("46"), Some(2));
        assert_eq!(table.get("46").map(|r| r.row_index), Some(2));
        assert_eq!(table.index_of("47"), None);
        assert_eq!(table.index_of("046"), None);
        assert_eq!(table.labels().collect::<Vec<_>>(), ["1", "2", "46"]);
    }

    #[test]
    fn duplicate_label_keeps_last_row() {
        let table = ChannelTable::from_records(vec![record("A", 0), record("A", 5)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("A").map(|r| r.row_index), Some(5));
    }

    #[test]
    fn calibration_from_record() {
        let r = ChannelRecord {
            ad_zero: 2048,
            conversion_factor: 10,
            exponent: -1,
            tick: 500,
            ..ChannelRecord::default()
        };
        let c = r.calibration();
        assert!((c.apply(2148) - 100.0).abs() < 1e-9);
        assert_eq!(c.sampling_frequency(), 2000.0);
    }
}
