// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagination engine — resolve a source document into page groups and emit
// each qualifying group as a new registered output.
//
// Emission order for one group:
//   assemble into a staged file
//   pause the queue
//   register the output name
//   commit the staged file to the registered name
//   write remapped layout and data sidecars
//   record the ledger entry
//   queue the output as Pending in the output action
//   resume the queue (guard drop, on every path)
//
// A failure after registration marks the output Failed. Until the ledger
// entry exists the committed file and its sidecars are removed as well, so
// the next pass emits the group again under a fresh name.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_catalog::{OutputMetadata, OutputRegistrar, QueueCoordinator, RandomSuffix, SuffixSource};
use folio_core::error::Result;
use folio_core::{
    CancellationToken, DocumentData, EngineConfig, FileCatalog, FileId, FileQueueRecord,
    FileStatus, LedgerStore, OutputDocument, PageGroup, PageKey, PageRef, QueueControl,
    Registration, SessionId,
};
use folio_document::{
    DocumentAssembler, DocumentLayout, JsonDataStore, JsonLayoutStore, JsonSerializer, LayoutStore,
    LopdfRenderer, PageMap, PageRenderer, StructuredDataStore, remap,
};
use folio_ledger::{PaginationLedger, RecordedPages, SidecarLock, hash_file};
use tracing::{debug, error, info, instrument, warn};

use crate::gate::{AlwaysQualify, QualificationContext, QualificationGate};
use crate::outcome::{DeferReason, GroupOutcome, GroupReport, ProcessReport};
use crate::panel::PanelHandle;
use crate::resolver::PageGroupResolver;

/// Store implementing every queue-side trait the engine needs.
pub trait QueueStore: FileCatalog + LedgerStore + QueueControl {}

impl<T: FileCatalog + LedgerStore + QueueControl> QueueStore for T {}

/// Assembles a [`PaginationEngine`] from its collaborators.
pub struct EngineBuilder {
    config: EngineConfig,
    catalog: Arc<dyn FileCatalog>,
    ledger_store: Arc<dyn LedgerStore>,
    control: Arc<dyn QueueControl>,
    renderer: Arc<dyn PageRenderer>,
    serializer: Arc<JsonSerializer>,
    data_store: Option<Arc<dyn StructuredDataStore>>,
    layout_store: Option<Arc<dyn LayoutStore>>,
    gate: Arc<dyn QualificationGate>,
    panel: Option<Arc<PanelHandle>>,
    suffixes: Arc<dyn SuffixSource>,
    cancel: CancellationToken,
    session: SessionId,
    tags: BTreeMap<String, String>,
}

impl EngineBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn serializer(mut self, serializer: Arc<JsonSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn data_store(mut self, store: Arc<dyn StructuredDataStore>) -> Self {
        self.data_store = Some(store);
        self
    }

    pub fn layout_store(mut self, store: Arc<dyn LayoutStore>) -> Self {
        self.layout_store = Some(store);
        self
    }

    pub fn gate(mut self, gate: Arc<dyn QualificationGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn panel(mut self, panel: Arc<PanelHandle>) -> Self {
        self.panel = Some(panel);
        self
    }

    pub fn suffix_source(mut self, suffixes: Arc<dyn SuffixSource>) -> Self {
        self.suffixes = suffixes;
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn session(mut self, session: SessionId) -> Self {
        self.session = session;
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<PaginationEngine> {
        self.config.validate()?;

        let data_store: Arc<dyn StructuredDataStore> = match self.data_store {
            Some(store) => store,
            None => Arc::new(JsonDataStore::new(Arc::clone(&self.serializer))),
        };
        let layout_store: Arc<dyn LayoutStore> = match self.layout_store {
            Some(store) => store,
            None => Arc::new(JsonLayoutStore::new(Arc::clone(&self.serializer))),
        };

        info!(session = %self.session, action = %self.config.processing_action, "pagination engine ready");

        Ok(PaginationEngine {
            resolver: PageGroupResolver::new(self.config.auto_rotate),
            registrar: OutputRegistrar::with_suffix_source(Arc::clone(&self.catalog), self.suffixes),
            coordinator: QueueCoordinator::new(Arc::clone(&self.catalog), self.control),
            ledger: PaginationLedger::new(self.ledger_store),
            assembler: DocumentAssembler::new(self.renderer),
            catalog: self.catalog,
            data_store,
            layout_store,
            gate: self.gate,
            panel: self.panel,
            cancel: self.cancel,
            session: self.session,
            tags: self.tags,
            config: self.config,
        })
    }
}

/// Re-paginates source documents into registered outputs.
pub struct PaginationEngine {
    config: EngineConfig,
    catalog: Arc<dyn FileCatalog>,
    resolver: PageGroupResolver,
    registrar: OutputRegistrar,
    coordinator: QueueCoordinator,
    ledger: PaginationLedger,
    assembler: DocumentAssembler,
    data_store: Arc<dyn StructuredDataStore>,
    layout_store: Arc<dyn LayoutStore>,
    gate: Arc<dyn QualificationGate>,
    panel: Option<Arc<PanelHandle>>,
    cancel: CancellationToken,
    session: SessionId,
    tags: BTreeMap<String, String>,
}

/// Inputs shared by every group of one source.
struct SourceContext<'a> {
    record: &'a FileQueueRecord,
    path: &'a Path,
    layouts: HashMap<String, DocumentLayout>,
    recorded: RecordedPages,
}

impl PaginationEngine {
    /// Start building an engine around one store that serves as catalog,
    /// ledger and queue control.
    pub fn builder<S>(config: EngineConfig, store: Arc<S>) -> EngineBuilder
    where
        S: QueueStore + 'static,
    {
        EngineBuilder {
            config,
            catalog: store.clone(),
            ledger_store: store.clone(),
            control: store,
            renderer: Arc::new(LopdfRenderer::new()),
            serializer: Arc::new(JsonSerializer::new()),
            data_store: None,
            layout_store: None,
            gate: Arc::new(AlwaysQualify),
            panel: None,
            suffixes: Arc::new(RandomSuffix),
            cancel: CancellationToken::new(),
            session: SessionId::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Process one source document. Returns `true` when every resolved
    /// group produced qualifying output, was a pure-deletion group, or was
    /// already handled.
    pub fn process_document(&self, source: &FileQueueRecord) -> Result<bool> {
        self.process_with_report(source).map(|r| r.fully_handled)
    }

    /// [`Self::process_document`] with the per-group breakdown.
    #[instrument(skip(self, source), fields(file_id = %source.file_id, document = %source.file_name, session = %self.session))]
    pub fn process_with_report(&self, source: &FileQueueRecord) -> Result<ProcessReport> {
        self.cancel.check()?;
        let path = PathBuf::from(&source.file_name);

        // Held until the pass ends, on every path.
        let _sidecar_lock = SidecarLock::acquire(&self.config.data_sidecar(&path))?;

        let data = self.data_store.load(&self.config.data_sidecar(&path))?;
        let layout = self.layout_store.load(&self.config.layout_sidecar(&path))?;

        let page_count = if source.page_count > 0 {
            source.page_count
        } else {
            self.assembler.renderer().page_count(&path)?
        };

        let groups = self
            .resolver
            .resolve(&source.file_name, page_count, data.as_ref(), layout.as_ref())?;

        let mut layouts = HashMap::new();
        if let Some(layout) = layout {
            layouts.insert(source.file_name.clone(), layout);
        }
        let ctx = SourceContext {
            record: source,
            path: &path,
            layouts,
            recorded: self.ledger.recorded_pages(&source.file_name)?,
        };

        let mut reports = Vec::with_capacity(groups.len());
        for (index, group) in groups.into_iter().enumerate() {
            self.cancel.check()?;
            let origin = group.origin;
            let first_page = group.pages.first().map(|p| p.page_number);
            let page_count = group.pages.len();
            let outcome = self.process_group(&ctx, index, group)?;
            debug!(group = index, ?outcome, "group processed");
            reports.push(GroupReport {
                index,
                origin,
                first_page,
                page_count,
                outcome,
            });
        }

        let fully_handled = reports.iter().all(|r| r.outcome.is_handled());
        let rerouted = match (&self.config.source_action, fully_handled) {
            (Some(action), true) => {
                self.coordinator
                    .reroute(source.file_id, action, &self.config.workflow_id)?;
                true
            }
            _ => false,
        };

        let report = ProcessReport {
            file_id: source.file_id,
            document: source.file_name.clone(),
            session_id: self.session,
            groups: reports,
            fully_handled,
            rerouted,
        };
        info!(
            groups = report.groups.len(),
            emitted = report.emitted().count(),
            deferred = report.deferred(),
            fully_handled,
            rerouted,
            "document processed"
        );
        Ok(report)
    }

    fn process_group(
        &self,
        ctx: &SourceContext<'_>,
        index: usize,
        mut group: PageGroup,
    ) -> Result<GroupOutcome> {
        let keys = group.keys();
        if ctx.recorded.covers(&keys) {
            return Ok(GroupOutcome::AlreadyHandled);
        }

        if group.is_all_deleted() {
            self.ledger.record(&keys, None, self.session, None)?;
            return Ok(GroupOutcome::Deleted);
        }

        if !group.origin.is_auto_eligible() {
            return Ok(GroupOutcome::Deferred(DeferReason::NotSuggested));
        }

        if let Some(panel) = &self.panel {
            if let Some(data) = group.data.take() {
                match panel.format(data) {
                    Ok(formatted) => group.data = Some(formatted),
                    Err(err) if err.is_group_scoped() => {
                        warn!(group = index, error = %err, "formatting fault, group deferred");
                        return Ok(GroupOutcome::Deferred(DeferReason::FormattingFault(
                            err.to_string(),
                        )));
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        let proposed = self.proposed_output_name(ctx.path, index, &group);
        let qualification = QualificationContext {
            source_document: ctx.record.file_name.clone(),
            source_file_id: Some(ctx.record.file_id),
            workflow_id: self.config.workflow_id.clone(),
            tags: self.tags.clone(),
        };
        match self.gate.qualifies(&group, &proposed, &qualification) {
            Ok(true) => group.qualified = Some(true),
            Ok(false) => {
                group.qualified = Some(false);
                info!(group = index, output = %proposed, "group not qualified, deferred");
                return Ok(GroupOutcome::Deferred(DeferReason::NotQualified));
            }
            Err(err) if err.is_group_scoped() => {
                warn!(group = index, error = %err, "qualification fault, group deferred");
                return Ok(GroupOutcome::Deferred(DeferReason::QualificationFault(
                    err.to_string(),
                )));
            }
            Err(err) => return Err(err),
        }

        self.emit(ctx, &group, &proposed)
    }

    /// Assemble, register and record one qualified group.
    #[instrument(skip(self, ctx, group), fields(pages = group.pages.len()))]
    fn emit(&self, ctx: &SourceContext<'_>, group: &PageGroup, proposed: &str) -> Result<GroupOutcome> {
        let output_dir = self.output_directory(ctx.path);
        let extension = Path::new(proposed)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pdf".into());

        let staged = self
            .assembler
            .assemble(&group.pages, &output_dir, &extension, &self.cancel)?;
        let priority = self.output_priority(ctx.record, group)?;

        let _pause = self.coordinator.pause()?;

        let registration = self.registrar.register(
            proposed,
            &OutputMetadata {
                file_size: staged.file_size(),
                page_count: staged.page_count(),
                priority,
                workflow_id: &self.config.workflow_id,
            },
        )?;
        let file_id = registration.file_id;
        let final_path = PathBuf::from(&registration.file_name);

        if let Err(err) = staged.commit(&final_path) {
            self.mark_failed(file_id);
            return Err(err);
        }

        let output = match self.write_artifacts(ctx, group, registration, &final_path) {
            Ok(output) => output,
            Err(err) => {
                self.mark_failed(file_id);
                self.discard_files(&final_path);
                return Err(err);
            }
        };

        // The ledger points at the file now, so it stays on disk.
        if let Err(err) = self.coordinator.transition(
            file_id,
            &self.config.output_action,
            &self.config.workflow_id,
            FileStatus::Pending,
            false,
            false,
        ) {
            self.mark_failed(file_id);
            return Err(err);
        }

        info!(%file_id, output = %output.file_name, "output emitted");
        Ok(GroupOutcome::Emitted {
            file_id: output.assigned_file_id,
            file_name: output.file_name,
        })
    }

    /// Sidecars, hash and ledger entry for a committed output.
    fn write_artifacts(
        &self,
        ctx: &SourceContext<'_>,
        group: &PageGroup,
        registration: Registration,
        path: &Path,
    ) -> Result<OutputDocument> {
        let map = PageMap::from_pages(&registration.file_name, &group.pages)?;
        let empty = DocumentData::default();
        let remapped = remap(&map, &ctx.layouts, group.data.as_ref().unwrap_or(&empty));

        let output = OutputDocument {
            file_name: registration.file_name,
            source_pages: group.pages.clone(),
            attributes: remapped.data,
            assigned_file_id: registration.file_id,
        };
        self.layout_store
            .save(&self.config.layout_sidecar(path), &remapped.layout)?;
        self.data_store
            .save(&self.config.data_sidecar(path), &output.attributes)?;

        let output_hash = hash_file(path)?;
        let keys: Vec<PageKey> = output.source_pages.iter().map(PageRef::key).collect();
        self.ledger.record(
            &keys,
            Some(output.assigned_file_id),
            self.session,
            Some(output_hash),
        )?;
        Ok(output)
    }

    fn proposed_output_name(&self, source: &Path, index: usize, group: &PageGroup) -> String {
        let numbers: Vec<u32> = group.output_pages().map(|p| p.page_number).collect();
        let first = numbers.iter().copied().min().unwrap_or(0);
        let last = numbers.iter().copied().max().unwrap_or(0);
        let name = self.config.output_name(source, index + 1, first, last);
        self.output_directory(source)
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    fn output_directory(&self, source: &Path) -> PathBuf {
        match &self.config.output_directory {
            Some(dir) => dir.clone(),
            None => match source.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Highest priority among the group's source documents.
    fn output_priority(&self, source: &FileQueueRecord, group: &PageGroup) -> Result<i32> {
        let mut documents: Vec<String> = group
            .pages
            .iter()
            .map(|p| p.document_name.clone())
            .collect();
        documents.sort_unstable();
        documents.dedup();
        Ok(self
            .catalog
            .max_priority(&documents)?
            .unwrap_or(source.priority))
    }

    /// Best effort: the output is registered but never made it into the queue.
    fn mark_failed(&self, file_id: FileId) {
        if let Err(err) = self.coordinator.transition(
            file_id,
            &self.config.output_action,
            &self.config.workflow_id,
            FileStatus::Failed,
            true,
            true,
        ) {
            error!(%file_id, error = %err, "could not mark unfinished output failed");
        }
    }

    /// Best effort: remove an output and its sidecars before any ledger
    /// entry refers to them.
    fn discard_files(&self, output: &Path) {
        for path in [
            output.to_path_buf(),
            self.config.layout_sidecar(output),
            self.config.data_sidecar(output),
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "unrecorded file removed"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    error!(path = %path.display(), error = %err, "could not remove unrecorded file")
                }
            }
        }
    }
}

impl std::fmt::Debug for PaginationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationEngine")
            .field("session", &self.session)
            .field("processing_action", &self.config.processing_action)
            .finish_non_exhaustive()
    }
}
