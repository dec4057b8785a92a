pub trait TwoStatInference: Inference + TwoStatParam {}

pub trait Inference {
    type Mat;
    type Scalar;

    fn posterior_mean(&self) -> &Self::Mat;
    fn posterior_log_mean(&self) -> &Self::Mat;
    fn posterior_log_not_mean(&self) -> &Self::Mat;

    fn calibrate(&mut self);

    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A parameter vector with two kinds of sufficient statistics on top
/// of per-entry hyper parameters (a0, b0)
pub trait TwoStatParam {
    type Mat;
    type Scalar;

    fn new(hyper_a: Self::Mat, hyper_b: Self::Mat) -> Self;
    fn add_stat(&mut self, add_a: &Self::Mat, add_b: &Self::Mat);
    fn update_stat(&mut self, update_a: &Self::Mat, update_b: &Self::Mat);
    fn reset_stat(&mut self);
}
