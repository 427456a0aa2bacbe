// This file is part of the terraform-provider-scaleway project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
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

use anyhow::Result;
use tf_provider::serve;
use tracing_subscriber::EnvFilter;

mod adapter;
mod client;
mod config;
mod expand;
mod iam;
mod instance;
mod lb;
mod locality;
mod meta;
mod rdb;
mod scaleway_provider;
mod schema;
mod secret;
mod utils;
mod vpc;
mod waiter;

use scaleway_provider::ScalewayProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Terraform forwards the provider stderr to its own logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    serve("scaleway", ScalewayProvider::default()).await
}
