pub trait Optimizer {
    /// Takes a step over `params` following `grad`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]);
}
