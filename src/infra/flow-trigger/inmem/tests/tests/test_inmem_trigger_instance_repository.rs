// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use dill::{Catalog, CatalogBuilder};
use kamu_flow_trigger_inmem::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

macro_rules! inmem_repository_test {
    ($test_name: ident) => {
        #[test_log::test(tokio::test)]
        async fn $test_name() {
            let harness = InMemoryTriggerInstanceRepositoryHarness::new();
            kamu_flow_trigger_repo_tests::$test_name(&harness.catalog).await;
        }
    };
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

inmem_repository_test!(test_empty_repository);
inmem_repository_test!(test_upload_and_get_by_id);
inmem_repository_test!(test_update_dependency_execution_status);
inmem_repository_test!(test_update_associated_flow_execution);
inmem_repository_test!(test_update_unknown_instance);
inmem_repository_test!(test_get_incomplete_trigger_instances);
inmem_repository_test!(test_get_recently_finished);
inmem_repository_test!(test_get_trigger_instances_of_flow);
inmem_repository_test!(test_delete_trigger_executions_finishing_older_than);

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

struct InMemoryTriggerInstanceRepositoryHarness {
    catalog: Catalog,
}

impl InMemoryTriggerInstanceRepositoryHarness {
    pub fn new() -> Self {
        let mut catalog_builder = CatalogBuilder::new();
        catalog_builder.add::<InMemoryTriggerInstanceRepository>();

        Self {
            catalog: catalog_builder.build(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
