// ============================================================
// Layer 5 — Global Gradient-Norm Clipping
// ============================================================
// Rescales all gradients together when their combined norm
// exceeds `max_norm`:
//
//   global_norm = sqrt(Σ ‖g_i‖²)   over every parameter tensor
//   if global_norm > max_norm:  g_i ← g_i · max_norm / global_norm
//
// Burn's GradientClippingConfig::Norm clips each parameter
// tensor on its own, so a model with many tensors can still
// take an update far above `max_norm`. Here the gradients are
// walked with a ModuleVisitor, which yields the ParamId of every
// float parameter, and looked up in GradientsParams by that id.
//
// Relative magnitudes between parameters are preserved; only
// the overall step length is bounded.

use std::marker::PhantomData;
use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

/// Sums ‖g‖² over every parameter that has a gradient.
struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: Option<Tensor<B::InnerBackend, 1>>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) else {
            return;
        };
        let squared = grad.powf_scalar(2.0).sum();
        self.total = Some(match self.total.take() {
            Some(total) => total + squared,
            None        => squared,
        });
    }
}

/// Multiplies every gradient by one coefficient.
struct Scale<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    coef:  f64,
    _b:    PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Scale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.coef));
        }
    }
}

/// L2 norm of all gradients of `model` taken together.
pub fn global_grad_norm<B, M>(model: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> { grads, total: None };
    model.visit(&mut visitor);
    visitor
        .total
        .map(|t| t.into_scalar().elem::<f64>().sqrt())
        .unwrap_or(0.0)
}

/// Clip the gradients of `model` to a global norm of `max_norm`.
/// Returns the gradients and the norm measured before clipping.
/// A non-positive `max_norm` disables clipping.
pub fn clip_grad_norm<B, M>(model: &M, mut grads: GradientsParams, max_norm: f64) -> (GradientsParams, f64)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(model, &grads);
    if max_norm > 0.0 && norm > max_norm {
        let mut visitor = Scale::<B> { grads: &mut grads, coef: max_norm / norm, _b: PhantomData };
        model.visit(&mut visitor);
    }
    (grads, norm)
}
