/// Outcome of one [`EarlyStopping::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStoppingCheck {
    /// The loss is a new minimum and the model should be checkpointed.
    pub improved: bool,
    /// Patience is exhausted.
    pub stop: bool,
    pub message: String,
}

/// Tracks the validation loss minimum and stops after `patience` checks without improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    delta: f64,
    counter: usize,
    min_loss: Option<f64>,
}

impl EarlyStopping {
    pub fn new(patience: usize, delta: f64) -> Self {
        Self {
            patience,
            delta,
            counter: 0,
            min_loss: None,
        }
    }

    pub fn min_loss(&self) -> Option<f64> {
        self.min_loss
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn check(&mut self, loss: f64) -> EarlyStoppingCheck {
        match self.min_loss {
            None => {
                self.min_loss = Some(loss);
                EarlyStoppingCheck {
                    improved: true,
                    stop: false,
                    message: "Early stopping is started!".to_string(),
                }
            }
            Some(min) if loss < min - self.delta => {
                self.min_loss = Some(loss);
                self.counter = 0;
                EarlyStoppingCheck {
                    improved: true,
                    stop: false,
                    message: format!("V_loss decreased ({min:7.5} --> {loss:7.5}). Saving model..."),
                }
            }
            Some(_) => {
                self.counter += 1;
                let stop = self.counter >= self.patience;
                let mut message =
                    format!("Early stopping counter: {} out of {}", self.counter, self.patience);
                if stop {
                    message.push_str(" *** TRAIN EARLY STOPPED! ***");
                }
                EarlyStoppingCheck {
                    improved: false,
                    stop,
                    message,
                }
            }
        }
    }
}
