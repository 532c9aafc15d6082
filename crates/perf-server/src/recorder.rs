/// CSV session recorder: one file per recording, fourteen fixed columns,
/// flushed per row so a crash mid-session loses at most the current line.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;

use perf_collector::now_ms;
use perf_protocol::events::Sample;
use perf_protocol::record::{record_row, RECORD_HEADER};

pub struct Recorder {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl Recorder {
    /// Open `<dir>/<epoch_ms>_<target>.csv` and write the header.
    pub fn create(dir: &Path, target: Option<&str>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = format!("{}_{}.csv", now_ms(), target.unwrap_or("unknown"));
        let path = dir.join(name);

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(RECORD_HEADER)?;
        writer.flush()?;

        info!(path = %path.display(), "recording session");
        Ok(Self { writer, path })
    }

    pub fn write(&mut self, sample: &Sample) -> anyhow::Result<()> {
        self.writer.write_record(record_row(sample))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn finalize(mut self) {
        let _ = self.writer.flush();
        info!(path = %self.path.display(), "recording finalized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_csv_in(dir: &Path) -> PathBuf {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        files.remove(0)
    }

    #[test]
    fn records_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::create(dir.path(), Some("com.example.app")).unwrap();

        let mut sample = Sample::empty(1000, Some("com.example.app".into()));
        sample.cpu = 25.9;
        sample.fps = 60;
        recorder.write(&sample).unwrap();
        recorder.finalize();

        let path = only_csv_in(dir.path());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_com.example.app.csv"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let mut lines = raw.lines();
        let header = lines.next().unwrap();
        assert_eq!(header.split(',').count(), RECORD_HEADER.len());
        assert!(header.starts_with("timestamp,package,cpu(%)"));

        let row = lines.next().unwrap();
        let cols: Vec<&str> = row.split(',').collect();
        assert_eq!(cols.len(), 14);
        assert_eq!(cols[0], "1000");
        assert_eq!(cols[2], "25.9");
        assert_eq!(cols[4], "60");
    }

    #[test]
    fn missing_target_names_the_file_unknown() {
        let dir = tempfile::tempdir().unwrap();
        Recorder::create(dir.path(), None).unwrap().finalize();
        let path = only_csv_in(dir.path());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_unknown.csv"));
    }
}
