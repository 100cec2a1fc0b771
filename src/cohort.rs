//! Cohort table: one row per patient, numeric cells that may be missing.
//!
//! Also hosts the two collaborator seams that feed it: [`FractionExtractor`] turns a
//! slide into tissue-class fractions and [`assemble_cohort`] joins those fractions onto
//! the clinical rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::error::{Result, SurvivalError};

const MISSING_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

#[derive(Debug, Clone, PartialEq)]
pub struct PatientRow {
    pub id: String,
    pub values: Vec<Option<f64>>, // aligned with CohortTable::columns
}

#[derive(Debug, Clone, PartialEq)]
pub struct CohortTable {
    id_column: String,
    columns: Vec<String>,
    rows: Vec<PatientRow>,
    index: HashMap<String, usize>,
    text_cells: BTreeMap<(usize, usize), String>, // (row, column) -> raw non-numeric cell
}

impl CohortTable {
    pub fn new(id_column: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            id_column: id_column.into(),
            columns,
            rows: Vec::new(),
            index: HashMap::new(),
            text_cells: BTreeMap::new(),
        }
    }

    pub fn push_row(&mut self, id: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let id = id.into();
        if values.len() != self.columns.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "row {id} has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        if self.index.contains_key(&id) {
            return Err(SurvivalError::invalid_survival_data(format!(
                "duplicate patient id {id}"
            )));
        }
        self.index.insert(id.clone(), self.rows.len());
        self.rows.push(PatientRow { id, values });
        Ok(())
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[PatientRow] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, id: &str) -> Option<&PatientRow> {
        self.index.get(id).map(|&i| &self.rows[i])
    }

    /// all values of one column in row order; fails if the column holds text
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let j = self
            .column_index(name)
            .ok_or_else(|| SurvivalError::invalid_parameter("column", name))?;
        if let Some(((i, _), raw)) = self.text_cells.iter().find(|((_, c), _)| *c == j) {
            return Err(SurvivalError::invalid_survival_data(format!(
                "patient {}, column {name}: {raw:?} is not numeric",
                self.rows[*i].id
            )));
        }
        Ok(self.rows.iter().map(|r| r.values[j]).collect())
    }

    /// raw text of a cell that didn't parse as a number
    pub fn text_cell(&self, id: &str, column: &str) -> Option<&str> {
        let i = *self.index.get(id)?;
        let j = self.column_index(column)?;
        self.text_cells.get(&(i, j)).map(String::as_str)
    }

    fn set_text(&mut self, row: usize, column: usize, raw: impl Into<String>) {
        self.rows[row].values[column] = None;
        self.text_cells.insert((row, column), raw.into());
    }

    pub fn from_path(path: &Path, id_column: &str) -> Result<Self> {
        info!(path = %path.display(), "loading cohort table");
        Self::from_reader(File::open(path)?, id_column)
    }

    /// read a headed CSV; `id_column` names the patient identifier.
    ///
    /// Cells that aren't numbers are kept as text and only rejected once a caller asks
    /// for that column's values, so unused descriptive columns don't get in the way.
    pub fn from_reader<R: Read>(reader: R, id_column: &str) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let id_pos = headers
            .iter()
            .position(|h| h == id_column)
            .ok_or_else(|| SurvivalError::invalid_parameter("id_column", id_column))?;
        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_pos)
            .map(|(_, h)| h.to_string())
            .collect();

        let mut table = Self::new(id_column, columns);
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let id = record.get(id_pos).unwrap_or_default().to_string();
            if id.is_empty() {
                warn!(line = line + 2, "skipping row without a patient id");
                continue;
            }
            let mut values = Vec::with_capacity(table.columns.len());
            let mut text = Vec::new();
            for (i, field) in record.iter().enumerate() {
                if i == id_pos {
                    continue;
                }
                match parse_cell(field) {
                    Ok(value) => values.push(value),
                    Err(_) => {
                        text.push((values.len(), field.to_string()));
                        values.push(None);
                    }
                }
            }
            table.push_row(id, values)?;
            let row = table.n_rows() - 1;
            for (column, raw) in text {
                table.set_text(row, column, raw);
            }
        }

        debug!(rows = table.n_rows(), columns = table.columns.len(), "cohort table loaded");
        Ok(table)
    }

    /// write as CSV, missing cells empty
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        let mut header = vec![self.id_column.clone()];
        header.extend(self.columns.iter().cloned());
        out.write_record(&header)?;
        for (i, row) in self.rows.iter().enumerate() {
            let mut record = vec![row.id.clone()];
            record.extend(row.values.iter().enumerate().map(|(j, v)| match self.text_cells.get(&(i, j)) {
                Some(raw) => raw.clone(),
                None => v.map(|x| x.to_string()).unwrap_or_default(),
            }));
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn parse_cell(field: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
    if MISSING_TOKENS.contains(&field) {
        return Ok(None);
    }
    let value: f64 = field.parse()?;
    Ok(value.is_finite().then_some(value))
}

/// per-slide tissue-class area fractions, label -> fraction in [0, 1]
pub trait FractionExtractor {
    fn fractions(&self, slide: &Path) -> Result<BTreeMap<String, f64>>;
}

impl<F> FractionExtractor for F
where
    F: Fn(&Path) -> Result<BTreeMap<String, f64>>,
{
    fn fractions(&self, slide: &Path) -> Result<BTreeMap<String, f64>> {
        self(slide)
    }
}

/// turns a decoded class-label map into named area fractions
#[derive(Debug, Clone)]
pub struct LabelFractions {
    classes: Vec<(String, u8)>,
    background: Option<u8>,
}

impl LabelFractions {
    pub fn new(classes: Vec<(String, u8)>) -> Self {
        Self {
            classes,
            background: None,
        }
    }

    /// pixels with this label are left out of the denominator
    pub fn with_background(mut self, label: u8) -> Self {
        self.background = Some(label);
        self
    }

    pub fn compute(&self, labels: ArrayView2<u8>) -> BTreeMap<String, f64> {
        let mut counts = [0usize; 256];
        for &label in labels.iter() {
            counts[label as usize] += 1;
        }
        let total = labels.len() - self.background.map_or(0, |b| counts[b as usize]);

        self.classes
            .iter()
            .map(|(name, label)| {
                let fraction = if total == 0 {
                    0.0
                } else {
                    counts[*label as usize] as f64 / total as f64
                };
                (name.clone(), fraction)
            })
            .collect()
    }
}

/// a slide artifact and the patient it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRecord {
    pub slide: PathBuf,
    pub patient: String,
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    #[serde(rename = "FILENAME")]
    filename: String,
    #[serde(rename = "PATIENT")]
    patient: String,
}

/// slide file name -> patient id, read from a `FILENAME`,`PATIENT` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideMapping {
    patients: BTreeMap<String, String>,
}

impl SlideMapping {
    pub fn from_path(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading slide mapping");
        Self::from_reader(File::open(path)?)
    }

    /// extra columns are ignored; a file name listed twice is an error
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut patients = BTreeMap::new();
        for row in csv_reader.deserialize::<MappingRow>() {
            let MappingRow { filename, patient } = row?;
            if patients.contains_key(&filename) {
                return Err(SurvivalError::invalid_survival_data(format!(
                    "slide {filename} is mapped twice"
                )));
            }
            patients.insert(filename, patient);
        }
        debug!(slides = patients.len(), "slide mapping loaded");
        Ok(Self { patients })
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn patient(&self, filename: &str) -> Option<&str> {
        self.patients.get(filename).map(String::as_str)
    }

    /// every mapped slide, resolved against `slide_dir`, in file-name order
    pub fn records(&self, slide_dir: &Path) -> Vec<SlideRecord> {
        self.patients
            .iter()
            .map(|(filename, patient)| SlideRecord {
                slide: slide_dir.join(filename),
                patient: patient.clone(),
            })
            .collect()
    }

    /// the files in `slide_dir` with `extension`, each paired with its patient.
    ///
    /// A slide on disk that the mapping doesn't know is an error.
    pub fn records_in_dir(&self, slide_dir: &Path, extension: &str) -> Result<Vec<SlideRecord>> {
        let mut filenames = Vec::new();
        for entry in fs::read_dir(slide_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    filenames.push(name.to_string());
                }
            }
        }
        filenames.sort();

        filenames
            .into_iter()
            .map(|filename| {
                let patient = self.patient(&filename).ok_or_else(|| {
                    SurvivalError::invalid_survival_data(format!("slide {filename} has no patient in the mapping"))
                })?;
                Ok(SlideRecord {
                    slide: slide_dir.join(&filename),
                    patient: patient.to_string(),
                })
            })
            .collect()
    }
}

/// `describe()`-style summary of one numeric column over its present values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64, // sample standard deviation, NaN below two values
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnSummary {
    /// an empty column summarises to count 0 with every statistic NaN
    pub fn from_values(column: impl Into<String>, values: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();
        present.sort_by(f64::total_cmp);
        let count = present.len();

        let mean = if count == 0 {
            f64::NAN
        } else {
            present.iter().sum::<f64>() / count as f64
        };
        let std = if count < 2 {
            f64::NAN
        } else {
            let ss: f64 = present.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        };

        Self {
            column: column.into(),
            count,
            mean,
            std,
            min: quantile(&present, 0.0),
            q25: quantile(&present, 0.25),
            median: quantile(&present, 0.5),
            q75: quantile(&present, 0.75),
            max: quantile(&present, 1.0),
        }
    }
}

/// linear interpolation between closest ranks, on sorted input
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

/// summarise the named columns of a cohort
pub fn describe(cohort: &CohortTable, columns: &[String]) -> Result<Vec<ColumnSummary>> {
    columns
        .iter()
        .map(|name| Ok(ColumnSummary::from_values(name.as_str(), &cohort.column_values(name)?)))
        .collect()
}

/// join slide fractions onto clinical rows, one output row per patient that has a slide.
///
/// Patients with several slides get the mean fraction per label. Clinical columns of
/// patients missing from `clinical` stay empty.
pub fn assemble_cohort<E: FractionExtractor + ?Sized>(
    clinical: &CohortTable,
    slides: &[SlideRecord],
    extractor: &E,
) -> Result<CohortTable> {
    info!(slides = slides.len(), "computing tissue fractions");

    // patient -> label -> (sum, count), patients in first-seen order
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, BTreeMap<String, (f64, usize)>> = HashMap::new();
    let mut labels: BTreeSet<String> = BTreeSet::new();

    for (done, record) in slides.iter().enumerate() {
        let fractions = extractor.fractions(&record.slide)?;
        let entry = sums.entry(record.patient.clone()).or_insert_with(|| {
            order.push(record.patient.clone());
            BTreeMap::new()
        });
        for (label, fraction) in fractions {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(SurvivalError::invalid_survival_data(format!(
                    "slide {}: fraction {label} = {fraction} outside [0, 1]",
                    record.slide.display()
                )));
            }
            let slot = entry.entry(label.clone()).or_insert((0.0, 0));
            slot.0 += fraction;
            slot.1 += 1;
            labels.insert(label);
        }
        if (done + 1) % 10 == 0 {
            info!("processed {}/{} slides", done + 1, slides.len());
        }
    }

    let fraction_labels: Vec<String> = labels
        .into_iter()
        .filter(|l| clinical.column_index(l).is_none())
        .collect();
    let mut columns = clinical.columns().to_vec();
    columns.extend(fraction_labels.iter().cloned());

    let mut joined = CohortTable::new(clinical.id_column(), columns);
    let mut unmatched = 0;
    for patient in order {
        let clinical_row = clinical.index.get(&patient).copied();
        let mut values = match clinical_row {
            Some(i) => clinical.rows[i].values.clone(),
            None => {
                unmatched += 1;
                vec![None; clinical.columns().len()]
            }
        };
        let means = &sums[&patient];
        let mean_of = |label: &str| means.get(label).map(|(sum, n)| sum / *n as f64);

        // fraction labels that clash with clinical columns overwrite them
        for (j, column) in clinical.columns().iter().enumerate() {
            if let Some(mean) = mean_of(column.as_str()) {
                values[j] = Some(mean);
            }
        }
        values.extend(fraction_labels.iter().map(|l| mean_of(l.as_str())));
        joined.push_row(patient.as_str(), values)?;

        if let Some(i) = clinical_row {
            let row = joined.n_rows() - 1;
            for ((_, j), raw) in clinical.text_cells.range((i, 0)..(i + 1, 0)) {
                if mean_of(clinical.columns[*j].as_str()).is_none() {
                    joined.set_text(row, *j, raw.as_str());
                }
            }
        }
    }

    if unmatched > 0 {
        warn!(unmatched, "patients with slides but no clinical record");
    }
    info!(patients = joined.n_rows(), "cohort assembled");
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    const CLINICAL: &str = "\
PATIENT,DSS.time,DSS,MSI
TCGA-01,300,1,0
TCGA-02,1200,0,1
TCGA-03,NA,1,0
";

    #[test]
    fn test_reads_csv_with_missing_cells() {
        let table = CohortTable::from_reader(CLINICAL.as_bytes(), "PATIENT").unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.columns(), &["DSS.time", "DSS", "MSI"]);
        assert_eq!(
            table.column_values("DSS.time").unwrap(),
            vec![Some(300.0), Some(1200.0), None]
        );
        assert_eq!(table.row("TCGA-02").unwrap().values[2], Some(1.0));
    }

    #[test]
    fn test_rejects_bad_cells_and_duplicates() {
        let bad = "PATIENT,DSS\nA,yes\n";
        let table = CohortTable::from_reader(bad.as_bytes(), "PATIENT").unwrap();
        assert!(table.column_values("DSS").is_err());

        let dup = "PATIENT,DSS\nA,1\nA,0\n";
        assert!(CohortTable::from_reader(dup.as_bytes(), "PATIENT").is_err());

        assert!(CohortTable::from_reader(CLINICAL.as_bytes(), "ID").is_err());
    }

    #[test]
    fn test_csv_write_then_read() {
        let table = CohortTable::from_reader(CLINICAL.as_bytes(), "PATIENT").unwrap();
        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let again = CohortTable::from_reader(buffer.as_slice(), "PATIENT").unwrap();
        assert_eq!(table, again);
    }

    #[test]
    fn test_label_fractions() {
        let labels = array![[0u8, 1, 1, 2], [2, 2, 3, 0]];
        let fractions = LabelFractions::new(vec![
            ("str_fraction".into(), 1),
            ("tum_fraction".into(), 2),
        ])
        .with_background(0)
        .compute(labels.view());

        assert_relative_eq!(fractions["str_fraction"], 2.0 / 6.0);
        assert_relative_eq!(fractions["tum_fraction"], 3.0 / 6.0);
    }

    #[test]
    fn test_assemble_joins_on_patient() {
        let clinical = CohortTable::from_reader(CLINICAL.as_bytes(), "PATIENT").unwrap();
        let slides = vec![
            SlideRecord { slide: "a.npy".into(), patient: "TCGA-02".into() },
            SlideRecord { slide: "b.npy".into(), patient: "TCGA-09".into() },
            SlideRecord { slide: "c.npy".into(), patient: "TCGA-02".into() },
        ];
        let extractor = |slide: &Path| -> Result<BTreeMap<String, f64>> {
            let value = match slide.to_str() {
                Some("a.npy") => 0.2,
                Some("b.npy") => 0.5,
                _ => 0.4,
            };
            Ok(BTreeMap::from([("str_fraction".to_string(), value)]))
        };

        let cohort = assemble_cohort(&clinical, &slides, &extractor).unwrap();
        assert_eq!(cohort.n_rows(), 2);
        assert_eq!(cohort.columns().last().unwrap(), "str_fraction");

        let two = cohort.row("TCGA-02").unwrap();
        assert_eq!(two.values[0], Some(1200.0));
        assert_relative_eq!(two.values[3].unwrap(), 0.3, epsilon = 1e-12);

        // slide without a clinical record keeps empty clinical cells
        let nine = cohort.row("TCGA-09").unwrap();
        assert_eq!(nine.values[..3], [None, None, None]);
        assert_eq!(nine.values[3], Some(0.5));
    }

    #[test]
    fn test_text_columns_load_until_used() {
        let csv = "PATIENT,gender,DSS.time,DSS\nA,MALE,300,1\nB,FEMALE,NA,0\n";
        let table = CohortTable::from_reader(csv.as_bytes(), "PATIENT").unwrap();

        assert_eq!(table.column_values("DSS.time").unwrap(), vec![Some(300.0), None]);
        assert_eq!(table.text_cell("B", "gender"), Some("FEMALE"));
        assert_eq!(table.text_cell("B", "DSS"), None);
        match table.column_values("gender") {
            Err(SurvivalError::InvalidSurvivalData { message }) => {
                assert!(message.contains("patient A") && message.contains("MALE"))
            }
            other => panic!("expected InvalidSurvivalData, got {other:?}"),
        }

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let again = CohortTable::from_reader(buffer.as_slice(), "PATIENT").unwrap();
        assert_eq!(table, again);
    }

    #[test]
    fn test_assemble_keeps_clinical_text() {
        let csv = "PATIENT,gender,DSS.time,DSS\nA,MALE,300,1\n";
        let clinical = CohortTable::from_reader(csv.as_bytes(), "PATIENT").unwrap();
        let slides = vec![SlideRecord { slide: "a.npy".into(), patient: "A".into() }];
        let extractor =
            |_: &Path| -> Result<BTreeMap<String, f64>> { Ok(BTreeMap::from([("str_fraction".to_string(), 0.4)])) };

        let cohort = assemble_cohort(&clinical, &slides, &extractor).unwrap();
        assert_eq!(cohort.text_cell("A", "gender"), Some("MALE"));
        assert_eq!(cohort.column_values("str_fraction").unwrap(), vec![Some(0.4)]);
    }

    #[test]
    fn test_slide_mapping() {
        let csv = "FILENAME,PATIENT,project\nb.npy,TCGA-02,COAD\na.npy,TCGA-01,READ\nc.npy,TCGA-01,READ\n";
        let mapping = SlideMapping::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.patient("b.npy"), Some("TCGA-02"));
        assert_eq!(mapping.patient("z.npy"), None);

        let records = mapping.records(Path::new("slides"));
        assert_eq!(records[0].slide, Path::new("slides").join("a.npy"));
        assert_eq!(records[0].patient, "TCGA-01");
        assert_eq!(records.len(), 3);

        let twice = "FILENAME,PATIENT\na.npy,X\na.npy,Y\n";
        assert!(SlideMapping::from_reader(twice.as_bytes()).is_err());
    }

    #[test]
    fn test_slide_mapping_scans_directory() {
        let dir = std::env::temp_dir().join(format!("tissue-survival-slides-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["b.npy", "a.npy", "notes.txt"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let mapping = SlideMapping::from_reader("FILENAME,PATIENT\na.npy,P1\nb.npy,P2\n".as_bytes()).unwrap();
        let records = mapping.records_in_dir(&dir, "npy").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].patient, "P1");
        assert_eq!(records[1].slide, dir.join("b.npy"));

        let partial = SlideMapping::from_reader("FILENAME,PATIENT\na.npy,P1\n".as_bytes()).unwrap();
        let unknown = partial.records_in_dir(&dir, "npy");

        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(unknown, Err(SurvivalError::InvalidSurvivalData { .. })));
    }

    #[test]
    fn test_describe_matches_pandas() {
        let csv = "PATIENT,str_fraction,gender\nA,0.1,M\nB,0.4,F\nC,,M\nD,0.2,F\nE,0.3,M\n";
        let table = CohortTable::from_reader(csv.as_bytes(), "PATIENT").unwrap();
        let summary = describe(&table, &["str_fraction".to_string()]).unwrap();
        let s = &summary[0];

        assert_eq!(s.count, 4);
        assert_relative_eq!(s.mean, 0.25, epsilon = 1e-12);
        // sample std of 0.1..0.4
        assert_relative_eq!(s.std, (0.05f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(s.min, 0.1, epsilon = 1e-12);
        assert_relative_eq!(s.q25, 0.175, epsilon = 1e-12);
        assert_relative_eq!(s.median, 0.25, epsilon = 1e-12);
        assert_relative_eq!(s.q75, 0.325, epsilon = 1e-12);
        assert_relative_eq!(s.max, 0.4, epsilon = 1e-12);

        let empty = ColumnSummary::from_values("x", &[None]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan() && empty.std.is_nan() && empty.max.is_nan());

        assert!(describe(&table, &["gender".to_string()]).is_err());
    }

    #[test]
    fn test_assemble_rejects_out_of_range_fraction() {
        let clinical = CohortTable::from_reader(CLINICAL.as_bytes(), "PATIENT").unwrap();
        let slides = vec![SlideRecord { slide: "a.npy".into(), patient: "TCGA-01".into() }];
        let extractor =
            |_: &Path| -> Result<BTreeMap<String, f64>> { Ok(BTreeMap::from([("x".to_string(), 1.5)])) };
        assert!(assemble_cohort(&clinical, &slides, &extractor).is_err());
    }
}
