//! Session state and step navigation.
//!
//! A [`Session`] owns the whole working set of one user: the parsed
//! template, the base metadata, the committed form values, the row table
//! and the uploaded data files. Steps run in a fixed order:
//!
//! ```text
//! Base ──▶ Forms ──▶ Files ──▶ Download
//! ```
//!
//! Moving forward is refused while the current step is incomplete.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::api::logs::{log_info, log_success};
use crate::cache::{StoreKind, TemplateStore};
use crate::error::{SessionError, SessionResult};
use crate::export::{
    assign_filenames, assign_titles, export_experiment, find_filename, selectable_columns, ExportBundle,
    ExportOptions, UploadedFiles,
};
use crate::form::{self, FieldRenderer, FormOutcome};
use crate::models::{CollectedFormData, ExperimentBaseMetadata, RowTable, TemplateMetadata};
use crate::parser::{TemplateFormat, TemplateReader};
use crate::preset::{create_elablite, preset_filename, PresetContainer};
use crate::validation::ValidationState;

/// Workflow step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Base,
    Forms,
    Files,
    Download,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Base, Step::Forms, Step::Files, Step::Download];

    pub fn next(self) -> Option<Step> {
        match self {
            Step::Base => Some(Step::Forms),
            Step::Forms => Some(Step::Files),
            Step::Files => Some(Step::Download),
            Step::Download => None,
        }
    }

    pub fn previous(self) -> Option<Step> {
        match self {
            Step::Base => None,
            Step::Forms => Some(Step::Base),
            Step::Files => Some(Step::Forms),
            Step::Download => Some(Step::Files),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Base => "Experiment",
            Step::Forms => "Forms",
            Step::Files => "Files",
            Step::Download => "Download",
        };
        f.write_str(name)
    }
}

/// The four artifacts of a session, as exchanged with clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingSet {
    pub metadata_base: ExperimentBaseMetadata,
    #[serde(default)]
    pub form_data: CollectedFormData,
    pub template_metadata: TemplateMetadata,
    #[serde(default)]
    pub dataframe_metadata: RowTable,
}

impl From<PresetContainer> for WorkingSet {
    fn from(container: PresetContainer) -> Self {
        Self {
            metadata_base: container.metadata_base,
            form_data: container.form_data,
            template_metadata: container.template_metadata,
            dataframe_metadata: container.dataframe_metadata,
        }
    }
}

/// Parsed template plus what it was read from.
#[derive(Debug, Clone)]
struct CachedTemplate {
    path: PathBuf,
    modified: Option<SystemTime>,
    format: TemplateFormat,
    metadata: TemplateMetadata,
}

impl CachedTemplate {
    fn is_fresh(&self, path: &Path, modified: Option<SystemTime>) -> bool {
        self.path == path && self.modified == modified
    }
}

/// Working state of one user session.
#[derive(Debug, Default)]
pub struct Session {
    step: Step,
    template: Option<CachedTemplate>,
    base: Option<ExperimentBaseMetadata>,
    form_data: CollectedFormData,
    table: Option<RowTable>,
    uploaded: UploadedFiles,
    validation: ValidationState,
    grouped: bool,
    filename_columns: Option<Vec<String>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Template
    // =========================================================================

    /// Select a template or preset file.
    ///
    /// The parsed template is cached: selecting the same unchanged file again
    /// is a no-op. A different or modified file resets the working set, then
    /// restores whatever a preset carries.
    pub fn load_template(&mut self, path: impl AsRef<Path>) -> SessionResult<&TemplateMetadata> {
        let path = path.as_ref();
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();

        if !self.template.as_ref().is_some_and(|cached| cached.is_fresh(path, modified)) {
            let reader = TemplateReader::open(path)?;
            let metadata = reader.read_metadata()?;
            metadata.validate()?;

            self.reset();
            let (base, form_data) = reader.read_preset();
            if let Some(base) = base {
                self.base = Some(base);
            }
            if let Some(form_data) = form_data {
                self.form_data = form_data;
            }
            self.table = Some(match reader.read_dataframe() {
                Some(table) => table,
                None => RowTable::for_template(&metadata)?,
            });

            log_success(format!(
                "Loaded {} ({} fields)",
                path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                metadata.extra_fields.len()
            ));
            self.template = Some(CachedTemplate {
                path: path.to_path_buf(),
                modified,
                format: reader.format(),
                metadata,
            });
        }

        self.template()
    }

    /// Store uploaded template/preset bytes, then select the stored file.
    pub fn upload_template(
        &mut self,
        store: &TemplateStore,
        file_name: &str,
        bytes: &[u8],
    ) -> SessionResult<&TemplateMetadata> {
        let kind = match TemplateFormat::detect(file_name)? {
            TemplateFormat::ElabLite => StoreKind::Presets,
            _ => StoreKind::Templates,
        };
        let path = store.save(kind, file_name, bytes)?;
        self.load_template(path)
    }

    /// Replace the working set wholesale (no file involved).
    pub fn load_working_set(&mut self, working_set: WorkingSet) -> SessionResult<()> {
        working_set.template_metadata.validate()?;
        self.reset();
        self.template = Some(CachedTemplate {
            path: PathBuf::new(),
            modified: None,
            format: TemplateFormat::ElabLite,
            metadata: working_set.template_metadata,
        });
        self.base = Some(working_set.metadata_base);
        self.form_data = working_set.form_data;
        self.table = Some(working_set.dataframe_metadata);
        Ok(())
    }

    /// Current working set; requires base metadata and a template.
    pub fn working_set(&self) -> SessionResult<WorkingSet> {
        Ok(WorkingSet {
            metadata_base: self.base()?.clone(),
            form_data: self.form_data.clone(),
            template_metadata: self.template()?.clone(),
            dataframe_metadata: self.table.clone().unwrap_or_default(),
        })
    }

    pub fn template(&self) -> SessionResult<&TemplateMetadata> {
        self.template
            .as_ref()
            .map(|cached| &cached.metadata)
            .ok_or(SessionError::NoTemplate)
    }

    pub fn template_format(&self) -> Option<TemplateFormat> {
        self.template.as_ref().map(|cached| cached.format)
    }

    fn reset(&mut self) {
        self.step = Step::Base;
        self.base = None;
        self.form_data.clear();
        self.table = None;
        self.uploaded.clear();
        self.validation.clear();
        self.filename_columns = None;
    }

    // =========================================================================
    // Working set
    // =========================================================================

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn base(&self) -> SessionResult<&ExperimentBaseMetadata> {
        self.base.as_ref().ok_or(SessionError::Missing("experiment base metadata"))
    }

    pub fn set_base(&mut self, base: ExperimentBaseMetadata) {
        self.base = Some(base);
    }

    pub fn form_data(&self) -> &CollectedFormData {
        &self.form_data
    }

    pub fn validation(&self) -> &ValidationState {
        &self.validation
    }

    pub fn table(&self) -> Option<&RowTable> {
        self.table.as_ref()
    }

    /// Row table for editing.
    pub fn table_mut(&mut self) -> SessionResult<&mut RowTable> {
        self.table.as_mut().ok_or(SessionError::Missing("row table"))
    }

    pub fn uploaded(&self) -> &UploadedFiles {
        &self.uploaded
    }

    pub fn grouped(&self) -> bool {
        self.grouped
    }

    pub fn set_grouped(&mut self, grouped: bool) {
        self.grouped = grouped;
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Render the template's form and commit the values.
    pub fn generate_form<R: FieldRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        disabled: bool,
    ) -> SessionResult<FormOutcome> {
        let template = &self.template.as_ref().ok_or(SessionError::NoTemplate)?.metadata;
        let outcome = form::generate_form(template, &mut self.form_data, renderer, &mut self.validation, disabled)?;
        Ok(outcome)
    }

    /// Whether the current step allows moving on.
    pub fn submit_enabled(&self) -> bool {
        match self.step {
            Step::Base => self.template.is_some() && self.base.as_ref().is_some_and(ExperimentBaseMetadata::is_complete),
            Step::Forms => self.required_fields_filled() && !self.validation.has_error(),
            Step::Files | Step::Download => true,
        }
    }

    fn required_fields_filled(&self) -> bool {
        let Ok(template) = self.template() else {
            return false;
        };
        template
            .extra_fields
            .iter()
            .filter(|(_, config)| config.required)
            .all(|(name, _)| self.form_data.get(name).is_some_and(|value| value.is_truthy()))
    }

    /// Advance to the next step.
    pub fn next_step(&mut self) -> SessionResult<Step> {
        if self.template.is_none() {
            return Err(SessionError::NoTemplate);
        }
        if !self.submit_enabled() {
            return Err(SessionError::StepBlocked(self.step));
        }
        if let Some(next) = self.step.next() {
            self.step = next;
            log_info(format!("Step: {}", next));
        }
        Ok(self.step)
    }

    /// Go back one step; always allowed.
    pub fn previous_step(&mut self) -> Step {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Add uploaded data files and map them onto the row table.
    pub fn attach_files<I>(&mut self, files: I) -> SessionResult<()>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        self.uploaded.extend(files);
        if self.table.is_none() {
            self.table = Some(RowTable::for_template(self.template()?)?);
        }
        let names: Vec<String> = self.uploaded.keys().cloned().collect();
        let table = self.table_mut()?;
        find_filename(table, &names);
        Ok(())
    }

    /// Add uploaded data files, keeping the table's `Filename` mapping.
    pub fn add_uploads<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        self.uploaded.extend(files);
    }

    /// Columns usable for generated filenames.
    pub fn filename_candidates(&self) -> Vec<String> {
        self.table.as_ref().map(selectable_columns).unwrap_or_default()
    }

    /// Compute `new_title` and `new_Filename` for every row and remember the
    /// column choice. Returns the first generated name as an example.
    pub fn validate_filenames(&mut self, columns: &[String]) -> SessionResult<Option<String>> {
        let base = self.base.as_ref().ok_or(SessionError::Missing("experiment base metadata"))?;
        let table = self.table.as_mut().ok_or(SessionError::Missing("row table"))?;
        assign_titles(table, &base.title);
        let example = assign_filenames(table, columns, base)?;
        self.filename_columns = Some(columns.to_vec());
        Ok(example)
    }

    pub fn filename_validated(&self) -> bool {
        self.filename_columns.is_some()
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Build the export zip.
    pub fn export(&mut self, work_dir: Option<PathBuf>) -> SessionResult<ExportBundle> {
        let base = self.base()?;
        let template = self.template()?;
        let empty = RowTable::default();
        let table = self.table.as_ref().unwrap_or(&empty);
        let options = ExportOptions {
            grouped: self.grouped,
            filename_columns: self.filename_columns.clone(),
            work_dir,
            ..Default::default()
        };
        let bundle = export_experiment(base, template, table, &self.uploaded, &options)?;
        self.table = Some(bundle.table.clone());
        Ok(bundle)
    }

    /// Serialize the working set; returns the download name and bytes.
    pub fn save_preset(&self) -> SessionResult<(String, Vec<u8>)> {
        let base = self.base()?;
        let template = self.template()?;
        let empty = RowTable::default();
        let table = self.table.as_ref().unwrap_or(&empty);
        let bytes = create_elablite(base, &self.form_data, template, table)?;
        Ok((preset_filename(base), bytes))
    }
}
