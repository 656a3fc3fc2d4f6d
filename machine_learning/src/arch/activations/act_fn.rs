use super::{relu, sigmoid};

/// An element-wise activation function applied after a layer's affine transform.
#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(sigmoid::Sigmoid),
    Relu(relu::Relu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(sigmoid::Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(relu::Relu)
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Relu(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_dispatches_to_the_rectifier() {
        let act_fn = ActFn::relu();

        assert_eq!(act_fn.f(-2.0), 0.0);
        assert_eq!(act_fn.f(3.0), 3.0);
        assert_eq!(act_fn.df(-2.0), 0.0);
        assert_eq!(act_fn.df(3.0), 1.0);
    }

    #[test]
    fn sigmoid_dispatches_to_the_logistic() {
        let act_fn = ActFn::sigmoid(1.0);

        assert_eq!(act_fn.f(0.0), 0.5);
        assert_eq!(act_fn.df(0.0), 0.25);
    }
}
