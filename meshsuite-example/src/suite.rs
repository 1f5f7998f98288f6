//! The example suite and how it is built from custom parameters.

use serde::Deserialize;

use meshsuite::{MeshError, MeshResult, TestRegistry, TestSuite, TestSuiteConfigurator};

use crate::exec_command_test::ExecCommandTest;
use crate::network_partition_test::NetworkPartitionTest;

/// Parameters passed through `CUSTOM_PARAMS_JSON`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExampleParams {
    pub alpine_image: String,
    pub ping_count: u32,
}

impl Default for ExampleParams {
    fn default() -> Self {
        Self {
            alpine_image: "alpine:3.12".to_string(),
            ping_count: 2,
        }
    }
}

pub struct ExampleSuite {
    params: ExampleParams,
}

impl TestSuite for ExampleSuite {
    fn tests(&self) -> TestRegistry {
        let image = &self.params.alpine_image;
        TestRegistry::new()
            .test("execCommandTest", ExecCommandTest::new(image))
            .test(
                "networkPartitionTest",
                NetworkPartitionTest::new(image, self.params.ping_count),
            )
    }

    fn network_width_bits(&self) -> u32 {
        8
    }
}

pub struct ExampleConfigurator;

impl TestSuiteConfigurator for ExampleConfigurator {
    fn parse_params_and_create_suite(&self, params_json: &str) -> MeshResult<Box<dyn TestSuite>> {
        let params: ExampleParams = serde_json::from_str(params_json).map_err(|e| {
            MeshError::configuration("CUSTOM_PARAMS_JSON", format!("'{params_json}': {e}"))
        })?;
        if params.ping_count == 0 {
            return Err(MeshError::configuration(
                "CUSTOM_PARAMS_JSON",
                "pingCount must be at least 1",
            ));
        }
        Ok(Box::new(ExampleSuite { params }))
    }
}
