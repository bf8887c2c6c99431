/// Compteur de vie du pipeline : remis au budget à chaque heartbeat,
/// décrémenté à chaque tick du watchdog. `<= 0` => pipeline bloqué.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessCounter {
    budget: i64,
    remaining: i64,
}

impl LivenessCounter {
    pub fn new(budget: u32) -> Self {
        let budget = i64::from(budget);
        Self { budget, remaining: budget }
    }

    pub fn reset(&mut self) {
        self.remaining = self.budget;
    }

    /// Un tick sans heartbeat ; retourne `true` si le pipeline est bloqué
    pub fn tick(&mut self) -> bool {
        self.remaining -= 1;
        self.is_stalled()
    }

    pub fn is_stalled(&self) -> bool {
        self.remaining <= 0
    }

    pub fn budget(&self) -> i64 {
        self.budget
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }
}
