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

//! Instance product: servers, flexible IPs, security groups and private NICs.

mod api;
mod ip;
mod private_nic;
mod security_group;
mod server;
mod server_data_source;

pub use ip::IpResource;
pub use private_nic::PrivateNicResource;
pub use security_group::SecurityGroupResource;
pub use server::ServerResource;
pub use server_data_source::ServerDataSource;
