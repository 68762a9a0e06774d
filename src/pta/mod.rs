// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The context-sensitive pointer-analysis engine.

use anyhow::Result;

use self::context_strategy::selector_for;
use self::cs_elems::CSObjId;
use self::result::PointerAnalysisResult;
use self::solver::PointerAnalysisSolver;
use crate::ir::Program;
use crate::pts_set::points_to::HybridPointsToSet;
use crate::taint::TaintAnalysis;

pub mod context;
pub mod context_strategy;
pub mod cs_elems;
pub mod heap;
pub mod result;
pub mod solver;

/// The points-to set type of the engine: context-sensitive objects.
pub type PointsTo = HybridPointsToSet<CSObjId>;

/// The stable id the pointer-analysis result is stored under.
pub const RESULT_ID: &str = "pta";

/// Runs the pointer analysis with the named context selector (`ci`,
/// `1-call`, `2-call`, `1-obj`, `2-obj`, `1-type`, `2-type`) and an
/// optional taint analysis attached.
pub fn analyze(
    program: &Program,
    selector_name: &str,
    taint: Option<TaintAnalysis>,
) -> Result<PointerAnalysisResult> {
    let selector = selector_for(selector_name)?;
    Ok(PointerAnalysisSolver::new(program, selector, taint).solve())
}
