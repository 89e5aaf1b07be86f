use fail::FailScenario;

/// Configures fail points for the lifetime of the value and turns them off on drop.
///
/// Holding the scenario also serializes tests that use fail points.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> CustomFailScenario<'a> {
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            fail::cfg(*failpoint, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }

    /// Configures another fail point while the scenario is held.
    pub fn enable(&mut self, failpoint: &str, action: &str) {
        fail::cfg(failpoint, action).unwrap();
        self.failpoints.push(failpoint.to_string());
    }

    /// Turns a fail point off again without ending the scenario.
    pub fn disable(&self, failpoint: &str) {
        fail::cfg(failpoint, "off").unwrap();
    }

    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            let _ = fail::cfg(failpoint, "off");
        }
    }
}
