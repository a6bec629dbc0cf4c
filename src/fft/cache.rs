//! Compiled program cache.
//!
//! Lookups are exact on the full [`Parameters`] tuple. The cache is not
//! synchronized: plan construction takes it by `&mut`, which serializes
//! every insertion.

use std::collections::HashMap;

use super::backend::ComputeBackend;
use super::shader::ShaderVariant;
use super::types::Parameters;
use super::FftError;

/// Maps program parameters to compiled program handles.
#[derive(Debug)]
pub struct ProgramCache<P> {
    programs: HashMap<Parameters, P>,
    compilations: usize,
}

impl<P> Default for ProgramCache<P> {
    fn default() -> Self {
        Self {
            programs: HashMap::new(),
            compilations: 0,
        }
    }
}

impl<P: Clone> ProgramCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the program for `params`, compiling it on first use.
    ///
    /// A compile failure is returned as [`FftError::Compile`] and nothing is
    /// inserted.
    pub fn get_or_build<B>(&mut self, backend: &mut B, params: &Parameters) -> Result<P, FftError>
    where
        B: ComputeBackend<Program = P>,
    {
        if let Some(program) = self.programs.get(params) {
            log::debug!("Program cache hit: radix {} {:?}", params.radix, params.mode);
            return Ok(program.clone());
        }

        let variant = ShaderVariant::from_parameters(params);
        let program = backend
            .compile_program(&variant)
            .map_err(|e| FftError::Compile {
                parameters: Box::new(*params),
                message: e.to_string(),
            })?;
        self.compilations += 1;
        log::debug!(
            "Compiled {} ({} programs cached)",
            variant.label(),
            self.programs.len() + 1
        );

        self.programs.insert(*params, program.clone());
        Ok(program)
    }

    pub fn get(&self, params: &Parameters) -> Option<&P> {
        self.programs.get(params)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Number of successful compilations since the cache was created.
    pub fn compilations(&self) -> usize {
        self.compilations
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }
}
