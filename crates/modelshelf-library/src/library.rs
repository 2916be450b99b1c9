//! The model library facade.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use serde_json::Value;
use tracing::{debug, trace, warn};

use modelshelf_core::association::{AssociationDescriptor, Member};
use modelshelf_core::config::LibraryConfig;
use modelshelf_core::error::Error as CoreError;
use modelshelf_core::group::{default_group_id, resolve_group_ids, GroupIndex};
use modelshelf_core::id::LibraryId;
use modelshelf_core::model::{CrdsParameters, DataModel, ModelFormat};
use modelshelf_store::{
    build_store_from_config, same_file, InMemoryStore, MemberSource, ModelStore, StoreKind,
    StoreStats,
};

use crate::error::{BorrowError, LibraryError, Result, ShelveError};
use crate::hooks::{FinalizeInfo, ResultFinalizer};
use crate::iter::{MapModels, Models};
use crate::ledger::Ledger;
use crate::loan::Loan;
use crate::session::Session;

/// File name of the association written by [`ModelLibrary::save`].
pub const SAVED_ASN_FILENAME: &str = "asn.json";

/// What a library can be built from.
pub enum LibraryInit<F: ModelFormat> {
    /// Association manifest on disk; members resolve against its directory.
    Path(PathBuf),
    /// Already-parsed association; members resolve against the working
    /// directory.
    Association(AssociationDescriptor),
    /// Loaded models. Always kept in memory.
    Models(Vec<F::Model>),
    /// Model files, opened up front and treated like `Models`.
    Files(Vec<PathBuf>),
    /// An existing library, returned as is.
    Library(ModelLibrary<F>),
}

impl<F: ModelFormat> From<PathBuf> for LibraryInit<F> {
    fn from(path: PathBuf) -> Self {
        LibraryInit::Path(path)
    }
}

impl<F: ModelFormat> From<&Path> for LibraryInit<F> {
    fn from(path: &Path) -> Self {
        LibraryInit::Path(path.to_path_buf())
    }
}

impl<F: ModelFormat> From<&str> for LibraryInit<F> {
    fn from(path: &str) -> Self {
        LibraryInit::Path(PathBuf::from(path))
    }
}

impl<F: ModelFormat> From<AssociationDescriptor> for LibraryInit<F> {
    fn from(asn: AssociationDescriptor) -> Self {
        LibraryInit::Association(asn)
    }
}

impl<F: ModelFormat> From<ModelLibrary<F>> for LibraryInit<F> {
    fn from(library: ModelLibrary<F>) -> Self {
        LibraryInit::Library(library)
    }
}

/// Association with every group id filled in, plus the index built from it.
struct Resolved {
    asn: AssociationDescriptor,
    groups: GroupIndex,
}

/// A fixed-size collection of data models backed by an association.
///
/// Models are borrowed by index while the library is open and must be
/// shelved before it closes. Where they live in between is up to the store
/// chosen at construction (`LibraryConfig::on_disk`).
pub struct ModelLibrary<F: ModelFormat> {
    id: LibraryId,
    format: F,
    /// Association after filtering; group ids may still be missing.
    asn: AssociationDescriptor,
    resolved: OnceCell<Resolved>,
    base_dir: Option<PathBuf>,
    /// Files the library was built from besides its members' sources.
    inputs: Vec<PathBuf>,
    pub(crate) ledger: Ledger,
    store: Box<dyn ModelStore<F>>,
}

impl<F> ModelLibrary<F>
where
    F: ModelFormat + 'static,
    F::Model: 'static,
{
    pub fn new(format: F, init: impl Into<LibraryInit<F>>, config: &LibraryConfig) -> Result<Self> {
        let exptypes = config.asn_exptypes.as_deref();
        let n_members = config.asn_n_members;

        let (asn, base_dir, inputs, store) = match init.into() {
            LibraryInit::Library(library) => return Ok(library),
            LibraryInit::Path(path) => {
                let path = absolutize(&path)?;
                let mut asn = format.load_asn(&path)?;
                asn.filter_members(exptypes, n_members);
                let store = build_store_from_config(config, asn.len())?;
                let base_dir = path.parent().map(Path::to_path_buf);
                (asn, base_dir, vec![path], store)
            }
            LibraryInit::Association(mut asn) => {
                asn.validate()?;
                asn.filter_members(exptypes, n_members);
                let store = build_store_from_config(config, asn.len())?;
                let base_dir = std::env::current_dir()
                    .map_err(|e| CoreError::io(".", e))?;
                (asn, Some(base_dir), Vec::new(), store)
            }
            LibraryInit::Files(paths) => {
                if config.on_disk {
                    return Err(on_disk_models());
                }
                let models = paths
                    .iter()
                    .map(|p| format.open_model(p))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let (asn, models) = synthesize(&format, models, config)?;
                let store: Box<dyn ModelStore<F>> = Box::new(InMemoryStore::with_models(models));
                (asn, None, paths, store)
            }
            LibraryInit::Models(models) => {
                if config.on_disk {
                    return Err(on_disk_models());
                }
                let (asn, models) = synthesize(&format, models, config)?;
                let store: Box<dyn ModelStore<F>> = Box::new(InMemoryStore::with_models(models));
                (asn, None, Vec::new(), store)
            }
        };

        let library = Self {
            id: LibraryId::new_v4(),
            ledger: Ledger::new(asn.len()),
            format,
            asn,
            resolved: OnceCell::new(),
            base_dir,
            inputs,
            store,
        };
        debug!(
            id = %library.id,
            members = library.len(),
            store = ?library.store.kind(),
            "model library created"
        );
        Ok(library)
    }

    /// Library over an association file with default configuration.
    pub fn from_asn_path(format: F, path: impl AsRef<Path>) -> Result<Self> {
        Self::new(format, path.as_ref(), &LibraryConfig::default())
    }
}

fn on_disk_models() -> LibraryError {
    LibraryError::InvalidInit("on_disk cannot be used for a list of models".into())
}

/// Expand `$VAR`/`${VAR}` then a leading `~`, and anchor relative paths at
/// the working directory.
fn absolutize(path: &Path) -> Result<PathBuf> {
    let path = expand_path(path);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().map_err(|e| CoreError::io(&path, e))?;
    Ok(cwd.join(path))
}

fn expand_path(path: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    let expanded = expand_vars(raw);
    let is_sep = |c: char| c == '/' || c == std::path::MAIN_SEPARATOR;
    match expanded.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(is_sep) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(is_sep)),
            None => PathBuf::from(expanded),
        },
        _ => PathBuf::from(expanded),
    }
}

/// Unset or malformed references are left as written.
fn expand_vars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, tail) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => ("", after),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], &after[end..])
            }
        };
        match (!name.is_empty()).then(|| std::env::var(name).ok()).flatten() {
            Some(value) => {
                out.push_str(&value);
                rest = tail;
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Build an association describing already-loaded models.
///
/// Filters are applied while walking the models, so the returned models line
/// up with the association's members.
fn synthesize<F: ModelFormat>(
    format: &F,
    models: Vec<F::Model>,
    config: &LibraryConfig,
) -> Result<(AssociationDescriptor, Vec<F::Model>)> {
    let wanted: Option<Vec<String>> = config
        .asn_exptypes
        .as_ref()
        .map(|types| types.iter().map(|t| t.to_lowercase()).collect());

    let mut filenames = HashSet::new();
    let mut members = Vec::new();
    let mut kept = Vec::new();
    for model in models {
        if config.asn_n_members.is_some_and(|n| kept.len() == n) {
            break;
        }
        let exptype = format.model_to_exptype(&model);
        if let Some(wanted) = &wanted {
            if !wanted.contains(&exptype.to_lowercase()) {
                continue;
            }
        }
        let filename = format.model_to_filename(&model);
        if !filenames.insert(filename.clone()) {
            return Err(LibraryError::InvalidInit(format!(
                "Models in library cannot use the same filename: {filename}"
            )));
        }
        let group_id = match format.model_to_group_id(&model) {
            Ok(id) => id,
            Err(e) if e.is_no_group_id() => default_group_id(members.len()),
            Err(e) => return Err(e.into()),
        };
        members.push(Member::new(filename, exptype).with_group_id(group_id));
        kept.push(model);
    }

    let asn = AssociationDescriptor::from_members(members);
    for (model, member) in kept.iter_mut().zip(asn.members()) {
        format.assign_member_to_model(model, member, &asn);
    }
    Ok((asn, kept))
}

fn resolve<'a, F: ModelFormat>(
    cell: &'a OnceCell<Resolved>,
    asn: &AssociationDescriptor,
    base_dir: Option<&Path>,
    format: &F,
) -> Result<&'a Resolved> {
    cell.get_or_try_init(|| {
        let mut asn = asn.clone();
        resolve_group_ids(&mut asn, base_dir, format)?;
        let groups = GroupIndex::from_association(&asn);
        trace!(groups = groups.len(), "group ids resolved");
        Ok(Resolved { asn, groups })
    })
}

impl<F: ModelFormat> ModelLibrary<F> {
    pub fn id(&self) -> LibraryId {
        self.id
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    /// Number of members. Needs no session and loads nothing.
    pub fn len(&self) -> usize {
        self.asn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asn.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.ledger.is_open()
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    pub fn on_disk(&self) -> bool {
        self.store.kind() == StoreKind::OnDisk
    }

    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Current shadow file for `index` (on-disk libraries only).
    pub fn shadow_path(&self, index: usize) -> Option<&Path> {
        self.store.shadow_path(index)
    }

    /// Shadow workspace root (on-disk libraries only).
    pub fn workspace(&self) -> Option<&Path> {
        self.store.workspace()
    }

    /// Directory relative member paths resolve against.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Indices currently on loan.
    pub fn borrowed_indices(&self) -> Vec<usize> {
        self.ledger.borrowed_indices()
    }

    fn resolved(&self) -> Result<&Resolved> {
        resolve(&self.resolved, &self.asn, self.base_dir.as_deref(), &self.format)
    }

    /// The association with every member's group id filled in.
    ///
    /// This is a snapshot taken at construction; changing a borrowed model's
    /// metadata does not update it.
    pub fn asn(&self) -> Result<&AssociationDescriptor> {
        Ok(&self.resolved()?.asn)
    }

    pub fn groups(&self) -> Result<&GroupIndex> {
        Ok(&self.resolved()?.groups)
    }

    /// Distinct group ids in first-seen order.
    pub fn group_names(&self) -> Result<Vec<&str>> {
        Ok(self.groups()?.names())
    }

    /// Group id -> ascending member indices, in first-seen group order.
    pub fn group_indices(&self) -> Result<Vec<(&str, &[usize])>> {
        Ok(self.groups()?.iter().collect())
    }

    pub fn crds_observatory(&self) -> &str {
        self.format.crds_observatory()
    }

    pub fn open(&mut self) -> Result<()> {
        self.ledger.open()?;
        debug!(id = %self.id, "library opened");
        Ok(())
    }

    /// Close the library. Fails, leaving it open, while any model is on loan.
    pub fn close(&mut self) -> Result<()> {
        self.ledger.close()?;
        debug!(id = %self.id, "library closed");
        Ok(())
    }

    /// End the current session even if loans are outstanding; those are
    /// reported as an error.
    pub(crate) fn end_session(&mut self) -> Result<()> {
        let result = self.ledger.end_session();
        debug!(id = %self.id, ok = result.is_ok(), "session ended");
        result
    }

    /// End the current session without checking loans.
    pub(crate) fn force_close(&mut self) {
        let outstanding = self.ledger.abandon();
        if outstanding > 0 {
            warn!(
                id = %self.id,
                outstanding,
                indices = ?self.ledger.borrowed_indices(),
                "session abandoned with models on loan"
            );
        } else {
            debug!(id = %self.id, "session abandoned");
        }
    }

    /// Open a session; see [`Session`]. End it with [`Session::close`], the
    /// only path that reports models still on loan.
    #[must_use = "the session must be ended with `close()` to check for un-returned models"]
    pub fn session(&mut self) -> Result<Session<'_, F>> {
        Session::begin(self)
    }

    /// Run `body` inside a session.
    ///
    /// On success the session is closed and a close failure is returned. If
    /// `body` fails the session is ended without checking loans and the
    /// body's error is returned.
    pub fn with_open<T, E>(
        &mut self,
        body: impl FnOnce(&mut Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<LibraryError>,
    {
        let mut session = self.session()?;
        let value = body(&mut *session)?;
        session.close()?;
        Ok(value)
    }

    /// Run `body` in the current session, or in a new one if closed.
    fn within_session<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.is_open() {
            body(self)
        } else {
            self.with_open(body)
        }
    }

    /// Borrow the model at `index`, intending to modify it.
    pub fn borrow(&mut self, index: usize) -> Result<Loan<F::Model>> {
        self.borrow_with(index, true)
    }

    /// Borrow the model at `index`. `modify` becomes the default for
    /// [`shelve`](Self::shelve).
    pub fn borrow_with(&mut self, index: usize, modify: bool) -> Result<Loan<F::Model>> {
        self.ledger.check_available(index)?;
        let resolved = resolve(&self.resolved, &self.asn, self.base_dir.as_deref(), &self.format)?;
        let source = MemberSource::new(&self.format, &resolved.asn, self.base_dir.as_deref());
        let model = self.store.get(index, &source)?;
        let serial = self.ledger.check_out(index, modify)?;
        trace!(index, %serial, modify, "borrowed");
        Ok(Loan::new(index, self.id, serial, model))
    }

    /// Return a loan using the intent recorded when it was borrowed.
    pub fn shelve(&mut self, loan: Loan<F::Model>) -> std::result::Result<(), ShelveError<Loan<F::Model>>> {
        self.shelve_loan(loan, None)
    }

    /// Return a loan, overriding the recorded intent.
    pub fn shelve_with(
        &mut self,
        loan: Loan<F::Model>,
        modify: bool,
    ) -> std::result::Result<(), ShelveError<Loan<F::Model>>> {
        self.shelve_loan(loan, Some(modify))
    }

    fn shelve_loan(
        &mut self,
        loan: Loan<F::Model>,
        modify: Option<bool>,
    ) -> std::result::Result<(), ShelveError<Loan<F::Model>>> {
        let intent = if loan.library == self.id {
            self.ledger.loan_intent(loan.index, loan.serial)
        } else {
            self.ledger
                .check_open()
                .and(Err(BorrowError::UnknownModel.into()))
        };
        let intent = match intent {
            Ok(intent) => intent,
            Err(e) => return Err(ShelveError::new(e, loan)),
        };
        let Loan {
            index,
            library,
            serial,
            model,
        } = loan;
        let modified = modify.unwrap_or(intent);
        match self.put(index, model, modified) {
            Ok(()) => {
                self.ledger.release(index);
                trace!(index, %serial, modified, "shelved");
                Ok(())
            }
            Err((error, model)) => Err(ShelveError::new(
                error,
                Loan::new(index, library, serial, model),
            )),
        }
    }

    /// Put `model` into the borrowed slot `index`, replacing whatever was
    /// borrowed from it.
    pub fn shelve_at(
        &mut self,
        index: usize,
        model: F::Model,
        modify: bool,
    ) -> std::result::Result<(), ShelveError<F::Model>> {
        if let Err(e) = self.ledger.index_intent(index) {
            return Err(ShelveError::new(e, model));
        }
        match self.put(index, model, modify) {
            Ok(()) => {
                self.ledger.release(index);
                trace!(index, modified = modify, "shelved by index");
                Ok(())
            }
            Err((error, model)) => Err(ShelveError::new(error, model)),
        }
    }

    fn put(
        &mut self,
        index: usize,
        model: F::Model,
        modified: bool,
    ) -> std::result::Result<(), (LibraryError, F::Model)> {
        let resolved = match resolve(&self.resolved, &self.asn, self.base_dir.as_deref(), &self.format) {
            Ok(resolved) => resolved,
            Err(e) => return Err((e, model)),
        };
        let source = MemberSource::new(&self.format, &resolved.asn, self.base_dir.as_deref());
        self.store
            .put(index, model, modified, &source)
            .map_err(|e| {
                let (error, model) = e.into_parts();
                (LibraryError::from(error), model)
            })
    }

    /// Iterate over all members, borrowing each in turn.
    ///
    /// Nothing is shelved automatically: return each loan (through the
    /// iterator's own `shelve*` methods) before advancing or the library will
    /// refuse to close.
    pub fn iter(&mut self) -> Models<'_, F> {
        Models::new(self)
    }

    /// Apply `f` to every model in order, shelving each with `modify`.
    ///
    /// Lazy: nothing happens until the returned iterator is advanced. If the
    /// library is closed a session is opened for the pass and closed after
    /// the last model.
    pub fn map_function<T, G>(&mut self, f: G, modify: bool) -> MapModels<'_, F, G>
    where
        G: FnMut(&mut F::Model, usize) -> T,
    {
        MapModels::new(self, f, modify)
    }

    /// Write every model into `dir` plus an association listing them.
    ///
    /// Returns the path of the written association. Fails before writing
    /// anything over a member source or the association the library was
    /// read from.
    pub fn save(&mut self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))?;
        let path = dir.join(SAVED_ASN_FILENAME);
        self.check_not_input(&path)?;

        let members = self.within_session(|library| {
            let mut members = Vec::with_capacity(library.len());
            let mut filenames = HashSet::new();
            for index in 0..library.len() {
                let loan = library.borrow_with(index, false)?;
                let saved = library.saved_member(index, &loan).and_then(|member| {
                    if !filenames.insert(member.expname.clone()) {
                        return Err(LibraryError::InvalidInit(format!(
                            "Models in library cannot use the same filename: {}",
                            member.expname
                        )));
                    }
                    let target = dir.join(&member.expname);
                    library.check_not_input(&target)?;
                    loan.save(&target)?;
                    members.push(member);
                    Ok(())
                });
                library.shelve(loan)?;
                saved?;
            }
            Ok(members)
        })?;

        let mut asn = AssociationDescriptor::from_members(members);
        asn.extra.insert(
            "generated_by".into(),
            Value::from(format!("modelshelf {}", modelshelf_core::VERSION)),
        );
        fs::write(&path, asn.to_json_string()?).map_err(|e| CoreError::io(&path, e))?;
        debug!(id = %self.id, path = %path.display(), members = asn.len(), "library saved");
        Ok(path)
    }

    fn check_not_input(&self, target: &Path) -> Result<()> {
        let sources = self.base_dir.as_deref().map(|dir| {
            (0..self.asn.len()).filter_map(move |i| self.asn.member_path(i, Some(dir)))
        });
        let clash = self
            .inputs
            .iter()
            .cloned()
            .chain(sources.into_iter().flatten())
            .any(|input| same_file(&input, target));
        if clash {
            return Err(LibraryError::WouldOverwriteInput(target.to_path_buf()));
        }
        Ok(())
    }

    fn saved_member(&self, index: usize, model: &F::Model) -> Result<Member> {
        let group_id = match self.format.model_to_group_id(model) {
            Ok(id) => id,
            Err(e) if e.is_no_group_id() => self
                .groups()?
                .group_of(index)
                .map(str::to_string)
                .unwrap_or_else(|| default_group_id(index)),
            Err(e) => return Err(e.into()),
        };
        Ok(Member::new(
            self.format.model_to_filename(model),
            self.format.model_to_exptype(model),
        )
        .with_group_id(group_id))
    }

    /// Reference-file parameters from one representative member.
    ///
    /// Uses the first science member, else member 0. Only that member is
    /// loaded.
    pub fn get_crds_parameters(&mut self) -> Result<CrdsParameters> {
        if self.is_empty() {
            return Err(LibraryError::Empty);
        }
        let index = match self.asn.members().iter().position(Member::is_science) {
            Some(index) => index,
            None => {
                warn!(
                    id = %self.id,
                    "no science member in association; using the first member for CRDS parameters"
                );
                0
            }
        };
        self.within_session(|library| {
            let loan = library.borrow_with(index, false)?;
            let params = loan.crds_parameters();
            library.shelve(loan)?;
            Ok(params)
        })
    }

    /// Run `step` over every model, shelving each as modified.
    pub fn finalize_result<S>(&mut self, step: &mut S, reference_files_used: &[String]) -> Result<()>
    where
        S: ResultFinalizer<F::Model> + ?Sized,
    {
        self.within_session(|library| {
            for index in 0..library.len() {
                let group_id = library
                    .groups()?
                    .group_of(index)
                    .map(str::to_string)
                    .unwrap_or_else(|| default_group_id(index));
                let mut loan = library.borrow(index)?;
                let info = FinalizeInfo {
                    index,
                    group_id: &group_id,
                    reference_files_used,
                };
                let outcome = step.finalize_result(&mut *loan, &info);
                library.shelve(loan)?;
                outcome?;
            }
            Ok(())
        })
    }
}

impl<F: ModelFormat> fmt::Debug for ModelLibrary<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLibrary")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("open", &self.is_open())
            .field("store", &self.store.kind())
            .field("borrowed", &self.ledger.borrowed_indices())
            .finish()
    }
}
