// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;
mod logger;
mod standalone;

use clap::Parser;
use log::error;

use crate::cli::Cli;
use crate::logger::init_logger;
use crate::standalone::run_standalone;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(e) = init_logger(cli.log_file.clone(), cli.log_level) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let result = run_standalone(cli);
    if let Err(ref e) = result {
        error!("Service failed: {:#}", e);
    }
    result
}
