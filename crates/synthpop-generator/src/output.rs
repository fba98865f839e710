//! Persistence of generated patients.
//!
//! Only the writer thread touches a [`RecordSink`], so implementations need
//! no synchronisation. Patients arrive whole; a sink never sees a partial
//! timeline.
//!
//! [`CsvSink`] writes two files into the output directory:
//!
//! ```text
//! patients.csv   id,region,area,ethnicity,gender,age_range,dob,deprivation_level
//! timelines.csv  id,age_range,<one column per module>
//! ```
//!
//! A module that has not been initialized at an age range is an empty cell.

use std::fs::File;
use std::io;
use std::path::Path;

use synthpop_types::Patient;

use crate::error::GeneratorError;

/// Patient demographics file name.
pub const PATIENTS_FILE: &str = "patients.csv";

/// Timeline file name.
pub const TIMELINES_FILE: &str = "timelines.csv";

const PATIENT_COLUMNS: [&str; 8] = [
    "id",
    "region",
    "area",
    "ethnicity",
    "gender",
    "age_range",
    "dob",
    "deprivation_level",
];

/// Destination for completed patients.
pub trait RecordSink {
    /// Persist one complete patient.
    fn write_patient(&mut self, patient: &Patient) -> Result<(), GeneratorError>;

    /// Flush everything written so far.
    fn finish(&mut self) -> Result<(), GeneratorError>;
}

/// Writes patients and timelines as CSV.
#[derive(Debug)]
pub struct CsvSink<W: io::Write> {
    patients: csv::Writer<W>,
    timelines: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Create `patients.csv` and `timelines.csv` in `directory`, creating
    /// the directory if needed, and write both headers.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Output`] if the directory or a file cannot
    /// be created, or [`GeneratorError::Write`] if a header cannot be
    /// written.
    pub fn create<'m, I>(directory: &Path, modules: I) -> Result<Self, GeneratorError>
    where
        I: IntoIterator<Item = &'m str>,
    {
        std::fs::create_dir_all(directory).map_err(|source| GeneratorError::Output {
            path: directory.to_path_buf(),
            source,
        })?;
        let open = |name: &str| {
            let path = directory.join(name);
            File::create(&path).map_err(|source| GeneratorError::Output { path, source })
        };
        Self::from_writers(open(PATIENTS_FILE)?, open(TIMELINES_FILE)?, modules)
    }
}

impl<W: io::Write> CsvSink<W> {
    /// Wrap two writers and write both headers.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Write`] if a header cannot be written.
    pub fn from_writers<'m, I>(patients: W, timelines: W, modules: I) -> Result<Self, GeneratorError>
    where
        I: IntoIterator<Item = &'m str>,
    {
        let mut patients = csv::Writer::from_writer(patients);
        patients.write_record(PATIENT_COLUMNS)?;

        let mut timelines = csv::Writer::from_writer(timelines);
        let header: Vec<&str> = ["id", "age_range"].into_iter().chain(modules).collect();
        timelines.write_record(&header)?;

        Ok(Self {
            patients,
            timelines,
        })
    }
}

impl<W: io::Write> RecordSink for CsvSink<W> {
    /// Timeline rows go out before the patient row, so a failed write never
    /// leaves a `patients.csv` entry with a truncated timeline. Rows already
    /// handed to a writer can still be lost if a later flush fails.
    fn write_patient(&mut self, patient: &Patient) -> Result<(), GeneratorError> {
        let d = &patient.demographics;
        let dob = d.dob.to_string();
        let deprivation = d.deprivation_level.to_string();
        let patient_row = [
            patient.id.as_str(),
            d.region.as_str(),
            d.area.as_str(),
            d.ethnicity.as_str(),
            d.gender.as_str(),
            d.age_range.label(),
            dob.as_str(),
            deprivation.as_str(),
        ];
        let timeline_rows: Vec<Vec<&str>> = patient
            .timeline
            .iter()
            .map(|record| {
                [patient.id.as_str(), record.age_range.as_str()]
                    .into_iter()
                    .chain(record.states.iter().map(|s| s.as_deref().unwrap_or("")))
                    .collect()
            })
            .collect();

        for row in &timeline_rows {
            self.timelines.write_record(row)?;
        }
        self.patients.write_record(patient_row)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), GeneratorError> {
        self.patients.flush().map_err(csv::Error::from)?;
        self.timelines.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Keeps patients in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    patients: Vec<Patient>,
    finished: bool,
}

impl MemorySink {
    /// An empty sink.
    pub const fn new() -> Self {
        Self {
            patients: Vec::new(),
            finished: false,
        }
    }

    /// Patients received, in arrival order.
    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// Whether [`RecordSink::finish`] has been called.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take the received patients.
    pub fn into_patients(self) -> Vec<Patient> {
        self.patients
    }
}

impl RecordSink for MemorySink {
    fn write_patient(&mut self, patient: &Patient) -> Result<(), GeneratorError> {
        self.patients.push(patient.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), GeneratorError> {
        self.finished = true;
        Ok(())
    }
}
