//! The Bea91 party.
//!
//! A [`Bea91Party`] evaluates Boolean operations on XOR shared bit vectors together with
//! its peer. XOR and NOT are local, AND consumes one multiplication triple per bit and
//! needs one round trip (Beaver's trick). Both parties must issue the same sequence of
//! operations on operands with the same plain/secret tags. Messages are addressed by a
//! per party sequence counter which is only advanced by operations that communicate.
use crate::bit_vector::{BitVector, InvalidLengthError};
use crate::config::{ConfigError, MtProviderKind, PartyConfig};
use crate::mul_triple::boolean::{InsecureMtProvider, OtMtProvider, DEFAULT_MAX_BATCH_SIZE};
use crate::mul_triple::{DynMtProvider, MtProvider, MulTriples};
use crate::share::ShareVector;
use crate::utils::BoxError;
use bea91_channel::{Channel, CommunicationError, Payload, PartyId, PtoDesc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument, trace};

pub const BEA91_PTO: PtoDesc = PtoDesc::new(0xB0_0000, "BEA91_Z2C");

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    First,
    Second,
}

/// Steps of the Bea91 protocol. The discriminant is used as the step id of messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PtoStep {
    InputShare = 0,
    BeaverEF = 1,
    RevealShare = 2,
}

/// Values of a single protocol call.
#[derive(Copy, Clone, Debug)]
struct CallCtx {
    extra_info: u64,
    bit_num: usize,
}

#[derive(Error, Debug)]
pub enum PartyError {
    #[error("Party is not initialized")]
    NotInitialized,
    #[error("Party is already initialized")]
    AlreadyInitialized,
    #[error("Protocol aborted in step {step:?}")]
    Abort {
        step: PtoStep,
        #[source]
        reason: AbortReason,
    },
    #[error("Error in communication with the other party")]
    Channel(#[from] CommunicationError),
    #[error("Unable to obtain multiplication triples")]
    MtProvider(#[source] BoxError),
    #[error("Illegal party id {0}. Must be 0 or 1.")]
    IllegalPartyId(PartyId),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
#[error("Unknown role {0:?}. Must be first or second.")]
pub struct ParseRoleError(String);

/// Why a received message was rejected.
#[derive(Error, Debug)]
pub enum AbortReason {
    #[error("expected {expected} elements, received {actual}")]
    ElementCount { expected: usize, actual: usize },
    #[error(transparent)]
    InvalidLength(#[from] InvalidLengthError),
}

impl Role {
    pub fn is_first(self) -> bool {
        matches!(self, Role::First)
    }

    pub fn index(self) -> usize {
        match self {
            Role::First => 0,
            Role::Second => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Role::First => Role::Second,
            Role::Second => Role::First,
        }
    }

    pub fn party_id(self) -> PartyId {
        match self {
            Role::First => PartyId::FIRST,
            Role::Second => PartyId::SECOND,
        }
    }
}

impl TryFrom<PartyId> for Role {
    type Error = PartyError;

    fn try_from(id: PartyId) -> Result<Self, Self::Error> {
        match id {
            PartyId::FIRST => Ok(Role::First),
            PartyId::SECOND => Ok(Role::Second),
            illegal => Err(PartyError::IllegalPartyId(illegal)),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::First => f.write_str("first"),
            Role::Second => f.write_str("second"),
        }
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" | "0" => Ok(Role::First),
            "second" | "1" => Ok(Role::Second),
            other => Err(ParseRoleError(other.to_owned())),
        }
    }
}

impl From<PtoStep> for u32 {
    fn from(step: PtoStep) -> Self {
        step as u32
    }
}

pub struct Bea91Party<Mtp> {
    role: Role,
    task_id: u64,
    channel: Channel,
    mt_provider: Mtp,
    rng: ChaCha20Rng,
    extra_info: u64,
    initialized: bool,
    max_batch_size: usize,
}

impl Bea91Party<DynMtProvider> {
    /// Create a party as described by `config`. The role of the config must match the
    /// party id of `channel`.
    pub fn from_config(config: &PartyConfig, channel: Channel) -> Result<Self, PartyError> {
        if config.role.party_id() != channel.own_party() {
            return Err(ConfigError::RoleMismatch {
                configured: config.role,
                channel: channel.own_party(),
            }
            .into());
        }
        let mut rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        let mt_provider = match config.mt_provider {
            MtProviderKind::Ot => OtMtProvider::new(
                ChaCha20Rng::from_seed(rng.gen()),
                channel.clone(),
                config.task_id,
            )
            .into_dyn(),
            MtProviderKind::Insecure => InsecureMtProvider::new(config.role).into_dyn(),
        };
        Ok(Self::new(channel, mt_provider, rng)?
            .with_task_id(config.task_id)
            .with_max_batch_size(config.max_batch_size))
    }
}

impl<Mtp> Bea91Party<Mtp>
where
    Mtp: MtProvider<Output = MulTriples> + Send,
    Mtp::Error: Error + Send + Sync + 'static,
{
    /// Create an uninitialized party. The role is determined by the party id of `channel`.
    pub fn new(channel: Channel, mt_provider: Mtp, rng: ChaCha20Rng) -> Result<Self, PartyError> {
        let role = Role::try_from(channel.own_party())?;
        Ok(Self {
            role,
            task_id: 0,
            channel,
            mt_provider,
            rng,
            extra_info: 0,
            initialized: false,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        })
    }

    /// Set the task id of all messages. Both parties must use the same id.
    pub fn with_task_id(mut self, task_id: u64) -> Self {
        self.task_id = task_id;
        self
    }

    /// Bound on the number of triples generated per round.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Initialize the triple provider. Must be called by both parties.
    #[instrument(skip_all, fields(role = %self.role), err)]
    pub async fn init(&mut self) -> Result<(), PartyError> {
        if self.initialized {
            return Err(PartyError::AlreadyInitialized);
        }
        self.mt_provider
            .init(self.max_batch_size)
            .await
            .map_err(mtp_error)?;
        self.initialized = true;
        info!("Initialized party");
        Ok(())
    }

    /// Return to the uninitialized state. The sequence counter is kept, so messages of a
    /// later session are never confused with those of an earlier one.
    pub fn destroy(&mut self) {
        debug!(role = %self.role, "Destroying party");
        self.initialized = false;
    }

    /// Secret share `x`. The other party must call [`Self::share_other`].
    #[instrument(level = "debug", skip_all, fields(role = %self.role, bit_num = x.len()))]
    pub async fn share_own(&mut self, x: &BitVector) -> Result<ShareVector, PartyError> {
        self.check_initialized()?;
        self.share_own_bits(x).await.map(ShareVector::secret)
    }

    /// Receive the share of a `bit_num` bit input of the other party.
    #[instrument(level = "debug", skip_all, fields(role = %self.role, bit_num = bit_num))]
    pub async fn share_other(&mut self, bit_num: usize) -> Result<ShareVector, PartyError> {
        self.check_initialized()?;
        self.share_other_bits(bit_num).await.map(ShareVector::secret)
    }

    /// Secret share all `xs` in one message.
    #[instrument(level = "debug", skip_all, fields(role = %self.role, count = xs.len()))]
    pub async fn share_own_batch(
        &mut self,
        xs: &[BitVector],
    ) -> Result<Vec<ShareVector>, PartyError> {
        self.check_initialized()?;
        let merged = BitVector::merge_all(xs);
        let lengths: Vec<_> = xs.iter().map(BitVector::len).collect();
        let shares = self.share_own_bits(&merged).await?;
        Ok(shares
            .split(&lengths)
            .into_iter()
            .map(ShareVector::secret)
            .collect())
    }

    #[instrument(level = "debug", skip_all, fields(role = %self.role, count = bit_nums.len()))]
    pub async fn share_other_batch(
        &mut self,
        bit_nums: &[usize],
    ) -> Result<Vec<ShareVector>, PartyError> {
        self.check_initialized()?;
        let shares = self.share_other_bits(bit_nums.iter().sum()).await?;
        Ok(shares
            .split(bit_nums)
            .into_iter()
            .map(ShareVector::secret)
            .collect())
    }

    /// # Panics
    /// If `x` and `y` have different lengths.
    pub fn xor(&self, x: &ShareVector, y: &ShareVector) -> Result<ShareVector, PartyError> {
        self.check_initialized()?;
        Ok(self.xor_local(x, y))
    }

    pub fn xor_batch(
        &self,
        pairs: &[(ShareVector, ShareVector)],
    ) -> Result<Vec<ShareVector>, PartyError> {
        self.check_initialized()?;
        Ok(pairs.iter().map(|(x, y)| self.xor_local(x, y)).collect())
    }

    pub fn not(&self, x: &ShareVector) -> Result<ShareVector, PartyError> {
        self.xor(x, &ShareVector::plain_ones(x.len()))
    }

    /// # Panics
    /// If `x` and `y` have different lengths.
    #[instrument(level = "debug", skip_all, fields(role = %self.role, bit_num = x.len()))]
    pub async fn and(
        &mut self,
        x: &ShareVector,
        y: &ShareVector,
    ) -> Result<ShareVector, PartyError> {
        self.check_initialized()?;
        assert_eq!(x.len(), y.len(), "operands of and must have equal length");
        match (x, y) {
            (ShareVector::Secret(x), ShareVector::Secret(y)) => {
                self.beaver_and(x, y).await.map(ShareVector::secret)
            }
            _ => Ok(and_local(x, y)),
        }
    }

    /// AND all pairs. The secret/secret pairs are multiplied in a single round.
    #[instrument(level = "debug", skip_all, fields(role = %self.role, count = pairs.len()))]
    pub async fn and_batch(
        &mut self,
        pairs: &[(ShareVector, ShareVector)],
    ) -> Result<Vec<ShareVector>, PartyError> {
        self.check_initialized()?;
        let mut lengths = vec![];
        let mut xs = vec![];
        let mut ys = vec![];
        for (x, y) in pairs {
            assert_eq!(x.len(), y.len(), "operands of and must have equal length");
            if let (ShareVector::Secret(x), ShareVector::Secret(y)) = (x, y) {
                lengths.push(x.len());
                xs.push(x);
                ys.push(y);
            }
        }
        let products = self
            .beaver_and(&BitVector::merge_all(xs), &BitVector::merge_all(ys))
            .await?;
        let mut products = products.split(&lengths).into_iter();
        Ok(pairs
            .iter()
            .map(|(x, y)| match (x, y) {
                (ShareVector::Secret(_), ShareVector::Secret(_)) => ShareVector::secret(
                    products
                        .next()
                        .expect("one product per secret pair"),
                ),
                _ => and_local(x, y),
            })
            .collect())
    }

    pub async fn or(
        &mut self,
        x: &ShareVector,
        y: &ShareVector,
    ) -> Result<ShareVector, PartyError> {
        let xor = self.xor(x, y)?;
        let and = self.and(x, y).await?;
        self.xor(&xor, &and)
    }

    /// Reconstruct `x` at this party. The other party must call [`Self::reveal_other`].
    #[instrument(level = "debug", skip_all, fields(role = %self.role, bit_num = x.len()))]
    pub async fn reveal_own(&mut self, x: &ShareVector) -> Result<BitVector, PartyError> {
        self.check_initialized()?;
        match x {
            ShareVector::Plain(bits) => Ok(bits.clone()),
            ShareVector::Secret(share) => self.reveal_own_bits(share).await,
        }
    }

    /// Send this party's share of `x` to the other party.
    #[instrument(level = "debug", skip_all, fields(role = %self.role, bit_num = x.len()))]
    pub async fn reveal_other(&mut self, x: &ShareVector) -> Result<(), PartyError> {
        self.check_initialized()?;
        match x {
            ShareVector::Plain(_) => Ok(()),
            ShareVector::Secret(share) => self.reveal_other_bits(share).await,
        }
    }

    #[instrument(level = "debug", skip_all, fields(role = %self.role, count = xs.len()))]
    pub async fn reveal_own_batch(
        &mut self,
        xs: &[ShareVector],
    ) -> Result<Vec<BitVector>, PartyError> {
        self.check_initialized()?;
        let (shares, lengths) = secret_parts(xs);
        let revealed = self.reveal_own_bits(&BitVector::merge_all(shares)).await?;
        let mut revealed = revealed.split(&lengths).into_iter();
        Ok(xs
            .iter()
            .map(|x| match x {
                ShareVector::Plain(bits) => bits.clone(),
                ShareVector::Secret(_) => revealed.next().expect("one output per secret"),
            })
            .collect())
    }

    #[instrument(level = "debug", skip_all, fields(role = %self.role, count = xs.len()))]
    pub async fn reveal_other_batch(&mut self, xs: &[ShareVector]) -> Result<(), PartyError> {
        self.check_initialized()?;
        let (shares, _) = secret_parts(xs);
        self.reveal_other_bits(&BitVector::merge_all(shares)).await
    }

    /// Reconstruct `x` at both parties. Both parties must call this method.
    #[instrument(level = "debug", skip_all, fields(role = %self.role, bit_num = x.len()))]
    pub async fn reveal_all(&mut self, x: &ShareVector) -> Result<BitVector, PartyError> {
        self.check_initialized()?;
        let share = match x {
            ShareVector::Plain(bits) => return Ok(bits.clone()),
            ShareVector::Secret(share) => share,
        };
        if share.is_empty() {
            return Ok(BitVector::zeros(0));
        }
        let ctx = self.next_ctx(share.len());
        let step = PtoStep::RevealShare;
        let (_, payload) = tokio::try_join!(
            send(&self.channel, self.task_id, step, ctx, vec![share.to_bytes()]),
            receive(&self.channel, self.task_id, step, ctx)
        )?;
        let [other] = decode(step, ctx, payload)?;
        Ok(other.xor(share))
    }

    fn check_initialized(&self) -> Result<(), PartyError> {
        if self.initialized {
            Ok(())
        } else {
            Err(PartyError::NotInitialized)
        }
    }

    fn next_ctx(&mut self, bit_num: usize) -> CallCtx {
        let ctx = CallCtx {
            extra_info: self.extra_info,
            bit_num,
        };
        self.extra_info += 1;
        ctx
    }

    async fn share_own_bits(&mut self, x: &BitVector) -> Result<BitVector, PartyError> {
        if x.is_empty() {
            return Ok(BitVector::zeros(0));
        }
        let ctx = self.next_ctx(x.len());
        let share = BitVector::random(x.len(), &mut self.rng);
        let masked = x.xor(&share);
        let payload = vec![masked.to_bytes()];
        send(&self.channel, self.task_id, PtoStep::InputShare, ctx, payload).await?;
        Ok(share)
    }

    async fn share_other_bits(&mut self, bit_num: usize) -> Result<BitVector, PartyError> {
        if bit_num == 0 {
            return Ok(BitVector::zeros(0));
        }
        let ctx = self.next_ctx(bit_num);
        let payload = receive(&self.channel, self.task_id, PtoStep::InputShare, ctx).await?;
        let [share] = decode(PtoStep::InputShare, ctx, payload)?;
        Ok(share)
    }

    async fn reveal_own_bits(&mut self, share: &BitVector) -> Result<BitVector, PartyError> {
        if share.is_empty() {
            return Ok(BitVector::zeros(0));
        }
        let ctx = self.next_ctx(share.len());
        let payload = receive(&self.channel, self.task_id, PtoStep::RevealShare, ctx).await?;
        let [other] = decode(PtoStep::RevealShare, ctx, payload)?;
        Ok(other.xor(share))
    }

    async fn reveal_other_bits(&mut self, share: &BitVector) -> Result<(), PartyError> {
        if share.is_empty() {
            return Ok(());
        }
        let ctx = self.next_ctx(share.len());
        let payload = vec![share.to_bytes()];
        send(&self.channel, self.task_id, PtoStep::RevealShare, ctx, payload).await
    }

    /// Multiply the secret shared `x` and `y` with one triple per bit.
    async fn beaver_and(&mut self, x: &BitVector, y: &BitVector) -> Result<BitVector, PartyError> {
        if x.is_empty() {
            return Ok(BitVector::zeros(0));
        }
        let ctx = self.next_ctx(x.len());
        let mts = self
            .mt_provider
            .request_mts(ctx.bit_num)
            .await
            .map_err(mtp_error)?;
        assert_eq!(ctx.bit_num, mts.len(), "MtProvider returned wrong amount");
        let (a, b, c) = mts.into_vectors();
        let e = x.xor(&a);
        let f = y.xor(&b);

        let step = PtoStep::BeaverEF;
        let (_, payload) = tokio::try_join!(
            send(&self.channel, self.task_id, step, ctx, vec![e.to_bytes(), f.to_bytes()]),
            receive(&self.channel, self.task_id, step, ctx)
        )?;
        let [other_e, other_f] = decode(step, ctx, payload)?;
        let e = e.xor(&other_e);
        let f = f.xor(&other_f);

        let mut z = e.and(&b);
        z.xor_assign(&f.and(&a));
        z.xor_assign(&c);
        if !self.role.is_first() {
            z.xor_assign(&e.and(&f));
        }
        Ok(z)
    }

    fn xor_local(&self, x: &ShareVector, y: &ShareVector) -> ShareVector {
        assert_eq!(x.len(), y.len(), "operands of xor must have equal length");
        match (x, y) {
            (ShareVector::Plain(x), ShareVector::Plain(y)) => ShareVector::plain(x.xor(y)),
            (ShareVector::Plain(plain), ShareVector::Secret(share))
            | (ShareVector::Secret(share), ShareVector::Plain(plain)) => {
                if self.role.is_first() {
                    ShareVector::secret(share.xor(plain))
                } else {
                    ShareVector::secret(share.clone())
                }
            }
            (ShareVector::Secret(x), ShareVector::Secret(y)) => ShareVector::secret(x.xor(y)),
        }
    }
}

async fn send(
    channel: &Channel,
    task_id: u64,
    step: PtoStep,
    ctx: CallCtx,
    payload: Payload,
) -> Result<(), PartyError> {
    let header = channel.outgoing(task_id, &BEA91_PTO, step.into(), ctx.extra_info);
    trace!(?step, ?ctx, "Sending message");
    Ok(channel.send(header, payload).await?)
}

async fn receive(
    channel: &Channel,
    task_id: u64,
    step: PtoStep,
    ctx: CallCtx,
) -> Result<Payload, PartyError> {
    let header = channel.incoming(task_id, &BEA91_PTO, step.into(), ctx.extra_info);
    trace!(?step, ?ctx, "Receiving message");
    Ok(channel.receive(header).await?)
}

/// AND of operands where at least one is plain.
fn and_local(x: &ShareVector, y: &ShareVector) -> ShareVector {
    match (x, y) {
        (ShareVector::Plain(x), ShareVector::Plain(y)) => ShareVector::plain(x.and(y)),
        (ShareVector::Plain(plain), ShareVector::Secret(share))
        | (ShareVector::Secret(share), ShareVector::Plain(plain)) => {
            ShareVector::secret(share.and(plain))
        }
        (ShareVector::Secret(_), ShareVector::Secret(_)) => {
            unreachable!("secret operands need interaction")
        }
    }
}

fn secret_parts(xs: &[ShareVector]) -> (Vec<&BitVector>, Vec<usize>) {
    xs.iter()
        .filter_map(|x| match x {
            ShareVector::Secret(share) => Some((share, share.len())),
            ShareVector::Plain(_) => None,
        })
        .unzip()
}

/// Decode a payload of `N` vectors with `ctx.bit_num` bits each.
fn decode<const N: usize>(
    step: PtoStep,
    ctx: CallCtx,
    payload: Payload,
) -> Result<[BitVector; N], PartyError> {
    let abort = |reason: AbortReason| PartyError::Abort { step, reason };
    let payload: [Vec<u8>; N] = payload.try_into().map_err(|payload: Payload| {
        abort(AbortReason::ElementCount {
            expected: N,
            actual: payload.len(),
        })
    })?;
    let decoded = payload.map(|bytes| BitVector::from_bytes(ctx.bit_num, &bytes));
    if let Some(err) = decoded.iter().find_map(|res| res.as_ref().err()) {
        return Err(abort(err.clone().into()));
    }
    Ok(decoded.map(|res| res.expect("errors are returned above")))
}

fn mtp_error<E: Error + Send + Sync + 'static>(err: E) -> PartyError {
    PartyError::MtProvider(BoxError::from_err(err))
}
