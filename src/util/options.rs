// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Analysis options.

use clap::{Arg, Command};

const OPTA_USAGE: &str = r#"opta [OPTIONS] PROGRAM"#;

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command<'static> {
    Command::new("opta")
        .no_binary_name(true)
        .override_usage(OPTA_USAGE)
        .arg(Arg::new("analysis")
            .long("analysis")
            .short('a')
            .takes_value(true)
            .multiple_occurrences(true)
            .value_parser([
                "cha",
                "pta",
                "constprop",
                "deadcode",
                "inter-constprop",
                "taint",
            ])
            .help("An analysis to run; repeat for several."))
        .arg(Arg::new("pta")
            .long("pta")
            .takes_value(true)
            .value_parser(["ci", "1-call", "2-call", "1-obj", "2-obj", "1-type", "2-type"])
            .default_value("ci")
            .help("The context selector of the pointer analysis."))
        .arg(Arg::new("taint-config")
            .long("taint-config")
            .takes_value(true)
            .help("Path to the taint configuration file."))
        .arg(Arg::new("call-graph-output")
            .long("dump-call-graph")
            .takes_value(true)
            .help("Dump the call graph in DOT format to the output file."))
        .arg(Arg::new("pts-output")
            .long("dump-pts")
            .takes_value(true)
            .help("Dump points-to results to the output file."))
        .arg(Arg::new("taint-output")
            .long("dump-taint-flows")
            .takes_value(true)
            .help("Dump detected taint flows to the output file."))
        .arg(Arg::new("PROGRAM")
            .help("The program document to be analyzed."))
}

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    pub program_path: Option<String>,
    pub analyses: Vec<String>,
    /// Context selector choice for the pointer analysis.
    pub pta: String,
    pub taint_config: Option<String>,
    pub call_graph_output: Option<String>,
    pub pts_output: Option<String>,
    pub taint_output: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            program_path: None,
            analyses: Vec::new(),
            pta: "ci".to_string(),
            taint_config: None,
            call_graph_output: None,
            pts_output: None,
            taint_output: None,
        }
    }
}

impl AnalysisOptions {
    /// Parses options from a list of strings, exiting with a diagnostic on
    /// invalid input.
    pub fn parse_from_args(&mut self, args: &[String]) {
        let matches = match make_options_parser().try_get_matches_from(args.iter()) {
            Ok(matches) => matches,
            Err(e) => e.exit(),
        };

        if let Some(analyses) = matches.get_many::<String>("analysis") {
            self.analyses = analyses.cloned().collect();
        }
        if let Some(pta) = matches.get_one::<String>("pta") {
            self.pta = pta.clone();
        }
        self.taint_config = matches.get_one::<String>("taint-config").cloned();
        self.call_graph_output = matches.get_one::<String>("call-graph-output").cloned();
        self.pts_output = matches.get_one::<String>("pts-output").cloned();
        self.taint_output = matches.get_one::<String>("taint-output").cloned();
        self.program_path = matches.get_one::<String>("PROGRAM").cloned();
    }
}
