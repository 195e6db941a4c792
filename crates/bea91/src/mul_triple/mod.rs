//! Multiplication triples and providers.
use crate::utils::{BoxError, ErasedError};
use async_trait::async_trait;
use std::error::Error;
use thiserror::Error;

pub mod boolean;

pub use boolean::MulTriples;

/// A boxed boolean [`MtProvider`] with erased error type.
pub type DynMtProvider = Box<dyn MtProvider<Output = MulTriples, Error = BoxError> + Send>;

/// Provides a source of multiplication triples.
///
/// Both parties must issue the same sequence of calls with the same amounts. The triples
/// returned by `request_mts` are handed out in generation order and never returned twice.
#[async_trait]
pub trait MtProvider {
    type Output;
    type Error;

    /// One-time setup, e.g. base OTs. `max_batch_size` bounds the number of triples
    /// generated in a single round.
    async fn init(&mut self, max_batch_size: usize) -> Result<(), Self::Error>;

    async fn precompute_mts(&mut self, amount: usize) -> Result<(), Self::Error>;

    /// Return exactly `amount` triples.
    async fn request_mts(&mut self, amount: usize) -> Result<Self::Output, Self::Error>;

    fn into_dyn(
        self,
    ) -> Box<dyn MtProvider<Output = Self::Output, Error = BoxError> + Send + 'static>
    where
        Self: Sized + Send + 'static,
        Self::Error: Error + Send + Sync + 'static,
    {
        Box::new(ErasedError(self))
    }
}

#[derive(Error, Debug)]
pub enum MtProviderError {
    #[error("Oblivious transfer failed")]
    Ot(#[from] bea91_ot::Error),
    #[error("Requested {requested} triples but the dealt batch has {dealt}")]
    BatchMismatch { requested: usize, dealt: usize },
}

#[async_trait]
impl<Mtp: MtProvider + Send> MtProvider for &mut Mtp {
    type Output = Mtp::Output;
    type Error = Mtp::Error;

    async fn init(&mut self, max_batch_size: usize) -> Result<(), Self::Error> {
        (**self).init(max_batch_size).await
    }

    async fn precompute_mts(&mut self, amount: usize) -> Result<(), Self::Error> {
        (**self).precompute_mts(amount).await
    }

    async fn request_mts(&mut self, amount: usize) -> Result<Self::Output, Self::Error> {
        (**self).request_mts(amount).await
    }
}

#[async_trait]
impl<Out, Err> MtProvider for Box<dyn MtProvider<Output = Out, Error = Err> + Send> {
    type Output = Out;
    type Error = Err;

    async fn init(&mut self, max_batch_size: usize) -> Result<(), Self::Error> {
        (**self).init(max_batch_size).await
    }

    async fn precompute_mts(&mut self, amount: usize) -> Result<(), Self::Error> {
        (**self).precompute_mts(amount).await
    }

    async fn request_mts(&mut self, amount: usize) -> Result<Self::Output, Self::Error> {
        (**self).request_mts(amount).await
    }
}

#[async_trait]
impl<Mtp> MtProvider for ErasedError<Mtp>
where
    Mtp: MtProvider + Send,
    <Mtp as MtProvider>::Error: Error + Send + Sync + 'static,
{
    type Output = Mtp::Output;
    type Error = BoxError;

    async fn init(&mut self, max_batch_size: usize) -> Result<(), Self::Error> {
        self.0.init(max_batch_size).await.map_err(BoxError::from_err)
    }

    async fn precompute_mts(&mut self, amount: usize) -> Result<(), Self::Error> {
        self.0
            .precompute_mts(amount)
            .await
            .map_err(BoxError::from_err)
    }

    async fn request_mts(&mut self, amount: usize) -> Result<Self::Output, Self::Error> {
        self.0.request_mts(amount).await.map_err(BoxError::from_err)
    }
}
