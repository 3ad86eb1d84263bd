// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Repository `repodata` XML documents.

[repomd::RepoMd] indexes the other metadata files of a repository.
[primary::Primary] lists the packages it provides.
*/

pub mod primary;
pub mod repomd;
