// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The per-run analysis context: the program under analysis, the options,
//! and a typed registry of analysis results.

use std::any::Any;
use std::collections::HashMap;

use log::*;

use super::Program;
use crate::util::options::AnalysisOptions;

pub struct AnalysisContext {
    pub program: Program,
    pub options: AnalysisOptions,
    results: HashMap<String, Box<dyn Any>>,
}

impl AnalysisContext {
    pub fn new(program: Program, options: AnalysisOptions) -> Self {
        AnalysisContext {
            program,
            options,
            results: HashMap::new(),
        }
    }

    /// Stores an analysis result under its stable id, replacing any
    /// previous value.
    pub fn store_result<T: 'static>(&mut self, id: &str, value: T) {
        if self.results.insert(id.to_string(), Box::new(value)).is_some() {
            debug!("result `{}` replaced", id);
        }
    }

    /// Retrieves a previously stored result. `None` if the id is unknown or
    /// was stored under a different type.
    pub fn get_result<T: 'static>(&self, id: &str) -> Option<&T> {
        self.results.get(id).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn has_result(&self, id: &str) -> bool {
        self.results.contains_key(id)
    }
}
