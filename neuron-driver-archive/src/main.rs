// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod archive;
mod changelog;
mod cli;
mod config;
mod error;
mod extract;
mod fetch;
mod integrity;
mod metadata;
mod pipeline;
mod version;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    std::process::exit(match cli::run_cli().await {
        Ok(_) => 0,
        Err(err) => {
            log::error!("{}", err);
            1
        }
    });
}
