use anyhow::Context;
use peakgroup_core::deisotope::IsotopeGroup;
use peakgroup_core::spectrum::{Peak, Scan};
use rayon::prelude::*;

use crate::runner::{Processed, Runner};

impl Runner {
    fn push_scan_fields(record: &mut csv::ByteRecord, filename: &str, scan: &Scan) {
        record.push_field(filename.as_bytes());
        record.push_field(scan.id.as_bytes());
        record.push_field(itoa::Buffer::new().format(scan.ms_level).as_bytes());
        record.push_field(ryu::Buffer::new().format(scan.retention_time).as_bytes());
    }

    pub fn serialize_group(filename: &str, scan: &Scan, group: &IsotopeGroup) -> csv::ByteRecord {
        let mono = group.monoisotopic();
        let mut record = csv::ByteRecord::new();
        Self::push_scan_fields(&mut record, filename, scan);
        record.push_field(itoa::Buffer::new().format(group.charge()).as_bytes());
        record.push_field(ryu::Buffer::new().format(mono.mz).as_bytes());
        record.push_field(ryu::Buffer::new().format(mono.intensity).as_bytes());
        record.push_field(ryu::Buffer::new().format(group.neutral_mass()).as_bytes());
        record.push_field(itoa::Buffer::new().format(group.len()).as_bytes());
        record.push_field(ryu::Buffer::new().format(group.total_intensity()).as_bytes());
        record
    }

    pub fn serialize_peak(filename: &str, scan: &Scan, peak: &Peak) -> csv::ByteRecord {
        let mut record = csv::ByteRecord::new();
        Self::push_scan_fields(&mut record, filename, scan);
        record.push_field(ryu::Buffer::new().format(peak.mz).as_bytes());
        record.push_field(ryu::Buffer::new().format(peak.intensity).as_bytes());
        record.push_field(ryu::Buffer::new().format(scan.background).as_bytes());
        record
    }

    fn write_records(
        &self,
        file_name: &str,
        headers: Vec<&str>,
        records: Vec<csv::ByteRecord>,
    ) -> anyhow::Result<String> {
        let path = self.make_path(file_name);

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);

        wtr.write_byte_record(&csv::ByteRecord::from(headers))?;
        for record in records {
            wtr.write_byte_record(&record)?;
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write `{}`", path.display()))?;
        Ok(path.display().to_string())
    }

    pub fn write_groups(&self, processed: &Processed, filenames: &[String]) -> anyhow::Result<String> {
        let headers = vec![
            "filename",
            "scan_id",
            "ms_level",
            "rt",
            "charge",
            "monoisotopic_mz",
            "monoisotopic_intensity",
            "neutral_mass",
            "isotope_peaks",
            "total_intensity",
        ];

        let records = processed
            .scans
            .par_iter()
            .flat_map_iter(|(file_id, p)| {
                p.groups
                    .iter()
                    .map(move |group| Self::serialize_group(&filenames[*file_id], &p.scan, group))
            })
            .collect::<Vec<_>>();

        self.write_records("isotope_groups.tsv", headers, records)
    }

    pub fn write_peaks(&self, processed: &Processed, filenames: &[String]) -> anyhow::Result<String> {
        let headers = vec![
            "filename",
            "scan_id",
            "ms_level",
            "rt",
            "mz",
            "intensity",
            "background",
        ];

        let records = processed
            .scans
            .par_iter()
            .flat_map_iter(|(file_id, p)| {
                p.scan
                    .peaks
                    .iter()
                    .map(move |peak| Self::serialize_peak(&filenames[*file_id], &p.scan, peak))
            })
            .collect::<Vec<_>>();

        self.write_records("peaks.tsv", headers, records)
    }
}
