// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Graph structures shared by the engines: control-flow graphs, the
//! inter-procedural CFG, the pointer-flow graph and call graphs.

pub mod call_graph;
pub mod cfg;
pub mod icfg;
pub mod pfg;
