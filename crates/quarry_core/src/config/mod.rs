use std::collections::HashMap;
use std::sync::LazyLock;

use quarry_error::{DbError, ErrorKind, Result};

use crate::types::scalar::ScalarValue;

/// Options controlling how a query is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Use the sort-merge join strategy where the join condition allows it.
    pub use_sort_merge_join: bool,
    /// Push single-source WHERE conjuncts down to their source.
    pub enable_predicate_pushdown: bool,
    /// Share repeated deterministic sub-expressions within a row.
    pub enable_cse: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            use_sort_merge_join: false,
            enable_predicate_pushdown: true,
            enable_cse: true,
        }
    }
}

impl CompileOptions {
    pub fn with_sort_merge_join(mut self, enabled: bool) -> Self {
        self.use_sort_merge_join = enabled;
        self
    }

    pub fn set_from_scalar(&mut self, name: &str, value: &ScalarValue) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name.to_ascii_lowercase().as_str())
            .ok_or_else(|| missing_setting(name))?;
        (func.set)(value, self).map_err(|e| {
            DbError::with_kind(
                ErrorKind::InvalidArgument,
                format!("Invalid value for setting '{name}': {}", e.message()),
            )
            .with_field("setting", name.to_string())
        })
    }

    pub fn get_as_scalar(&self, name: &str) -> Result<ScalarValue> {
        let func = GET_SET_FUNCTIONS
            .get(name.to_ascii_lowercase().as_str())
            .ok_or_else(|| missing_setting(name))?;
        Ok((func.get)(self))
    }

    /// Reset a single option to its default.
    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def = Self::default();
        let scalar = def.get_as_scalar(name)?;
        self.set_from_scalar(name, &scalar)
    }

    /// Names of every recognized option with their descriptions.
    pub fn settings() -> impl Iterator<Item = (&'static str, &'static str)> {
        let mut settings: Vec<_> = GET_SET_FUNCTIONS
            .iter()
            .map(|(name, funcs)| (*name, funcs.description))
            .collect();
        settings.sort_unstable();
        settings.into_iter()
    }
}

fn missing_setting(name: &str) -> DbError {
    DbError::with_kind(
        ErrorKind::InvalidArgument,
        format!("Missing setting for '{name}'"),
    )
    .with_field("setting", name.to_string())
}

struct SettingFunctions {
    set: fn(scalar: &ScalarValue, conf: &mut CompileOptions) -> Result<()>,
    get: fn(conf: &CompileOptions) -> ScalarValue,
    description: &'static str,
}

impl SettingFunctions {
    const fn new<S: CompileSetting>() -> Self {
        SettingFunctions {
            set: S::set_from_scalar as _,
            get: S::get_as_scalar as _,
            description: S::DESCRIPTION,
        }
    }
}

fn insert_setting<S: CompileSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<UseSortMergeJoin>(&mut map);
    insert_setting::<EnablePredicatePushdown>(&mut map);
    insert_setting::<EnableCse>(&mut map);

    map
});

pub trait CompileSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileOptions) -> Result<()>;
    fn get_as_scalar(conf: &CompileOptions) -> ScalarValue;
}

pub struct UseSortMergeJoin;

impl CompileSetting for UseSortMergeJoin {
    const NAME: &'static str = "use_sort_merge_join";
    const DESCRIPTION: &'static str = "Use the sort-merge join strategy where applicable";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileOptions) -> Result<()> {
        conf.use_sort_merge_join = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileOptions) -> ScalarValue {
        conf.use_sort_merge_join.into()
    }
}

pub struct EnablePredicatePushdown;

impl CompileSetting for EnablePredicatePushdown {
    const NAME: &'static str = "enable_predicate_pushdown";
    const DESCRIPTION: &'static str = "Push single-source filters down to their source";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileOptions) -> Result<()> {
        conf.enable_predicate_pushdown = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileOptions) -> ScalarValue {
        conf.enable_predicate_pushdown.into()
    }
}

pub struct EnableCse;

impl CompileSetting for EnableCse {
    const NAME: &'static str = "enable_cse";
    const DESCRIPTION: &'static str = "Compute repeated expressions once per row";

    fn set_from_scalar(scalar: &ScalarValue, conf: &mut CompileOptions) -> Result<()> {
        conf.enable_cse = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &CompileOptions) -> ScalarValue {
        conf.enable_cse.into()
    }
}
