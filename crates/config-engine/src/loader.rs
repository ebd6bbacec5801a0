use std::any::type_name;
use std::marker::PhantomData;

use tokio_util::sync::CancellationToken;

use crate::error::ConfigResult;
use crate::schema::ConfigRecord;
use crate::store::Store;

/// Typed access to one module's record.
///
/// ```ignore
/// let loader = Loader::<SyncConfig>::new(store.clone(), "sync");
/// let (cfg, version) = loader.load_with_version(&cancel)?;
/// ```
pub struct Loader<T> {
    store: Store,
    module: String,
    _record: PhantomData<fn() -> T>,
}

impl<T: ConfigRecord> Loader<T> {
    pub fn new(store: Store, module: impl Into<String>) -> Self {
        Self {
            store,
            module: module.into(),
            _record: PhantomData,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn load(&self, cancel: &CancellationToken) -> ConfigResult<T> {
        self.load_with_version(cancel).map(|(cfg, _)| cfg)
    }

    pub fn load_with_version(&self, cancel: &CancellationToken) -> ConfigResult<(T, i64)> {
        let (config, version) = self.store.load(cancel, &self.module)?;
        Ok((config.downcast::<T>()?, version))
    }

    pub fn save(
        &self,
        cancel: &CancellationToken,
        config: &mut T,
        preserve_secrets: bool,
    ) -> ConfigResult<i64> {
        self.store.save_record(
            cancel,
            &self.module,
            config,
            type_name::<T>(),
            preserve_secrets,
        )
    }
}

impl<T> Clone for Loader<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            module: self.module.clone(),
            _record: PhantomData,
        }
    }
}
