//! Contact-law protocol and the composed granular model.
//!
//! Every law advertises which hooks it implements through [`Capabilities`];
//! [`GranularModel`] only forwards the hooks a component declared. A richer
//! law reuses a simpler one by holding it as a wrapped field and delegating the
//! shared plumbing (see `NormalHookeHysteresis` wrapping `NormalHooke`).

use bitflags::bitflags;
use tracing::debug;

use crate::contact::{CollisionData, ContactData, ForceData};
use crate::error::Result;
use crate::history::HistorySetup;
use crate::properties::PropertyRegistry;
use crate::settings::Settings;
use crate::surface::SurfaceDefault;

bitflags! {
    /// Hooks a contact law implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Declares keyword options.
        const REGISTER_SETTINGS = 0b0001;
        /// Connects to per-type-pair coefficient tables.
        const CONNECT_TO_PROPERTIES = 0b0010;
        /// Responds to overlapping pairs.
        const COLLISION = 0b0100;
        /// Responds to tracked pairs that are no longer in contact.
        const NO_COLLISION = 0b1000;
    }
}

/// A contact-law component.
///
/// Hooks not named in [`ContactLaw::CAPABILITIES`] are never called by the
/// composed model, so their default no-op bodies are fine to leave in place.
pub trait ContactLaw {
    const CAPABILITIES: Capabilities;
    /// Identifier folded into the pair-style hashcode.
    const ID: i64;
    const NAME: &'static str;

    /// Builds the law, reserving its history values in registration order.
    fn new(hsetup: &mut dyn HistorySetup) -> Self
    where
        Self: Sized;

    fn register_settings(&self, _settings: &mut Settings) {}

    /// Reads back the options declared in `register_settings` once parsing is done.
    fn load_settings(&mut self, _settings: &Settings) -> Result<()> {
        Ok(())
    }

    fn connect_to_properties(&mut self, _registry: &mut PropertyRegistry) -> Result<()> {
        Ok(())
    }

    fn collision(
        &mut self,
        _cdata: &mut CollisionData,
        _i_forces: &mut ForceData,
        _j_forces: &mut ForceData,
    ) {
    }

    fn no_collision(
        &mut self,
        _cdata: &mut ContactData,
        _i_forces: &mut ForceData,
        _j_forces: &mut ForceData,
    ) {
    }

    fn begin_pass(
        &mut self,
        _cdata: &mut CollisionData,
        _i_forces: &mut ForceData,
        _j_forces: &mut ForceData,
    ) {
    }

    fn end_pass(
        &mut self,
        _cdata: &mut CollisionData,
        _i_forces: &mut ForceData,
        _j_forces: &mut ForceData,
    ) {
    }
}

/// Surface kinematics, normal law `N` and tangential law `T`, evaluated in that order.
pub struct GranularModel<N, T> {
    surface: SurfaceDefault,
    normal: N,
    tangential: T,
}

impl<N: ContactLaw, T: ContactLaw> GranularModel<N, T> {
    pub fn normal(&self) -> &N {
        &self.normal
    }

    pub fn tangential(&self) -> &T {
        &self.tangential
    }

    /// Pair-style hashcode written to restart files.
    pub const STYLE_HASHCODE: i64 = (SurfaceDefault::ID << 16) | (T::ID << 8) | N::ID;
}

impl<N: ContactLaw, T: ContactLaw> ContactLaw for GranularModel<N, T> {
    const CAPABILITIES: Capabilities = Capabilities::from_bits_retain(
        SurfaceDefault::CAPABILITIES.bits() | N::CAPABILITIES.bits() | T::CAPABILITIES.bits(),
    );
    const ID: i64 = Self::STYLE_HASHCODE;
    const NAME: &'static str = "gran";

    fn new(hsetup: &mut dyn HistorySetup) -> Self {
        let surface = SurfaceDefault::new(hsetup);
        let normal = N::new(hsetup);
        let tangential = T::new(hsetup);
        debug!(
            normal = N::NAME,
            tangential = T::NAME,
            capabilities = ?Self::CAPABILITIES,
            hashcode = Self::STYLE_HASHCODE,
            "composed granular model"
        );
        Self {
            surface,
            normal,
            tangential,
        }
    }

    fn register_settings(&self, settings: &mut Settings) {
        if SurfaceDefault::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            self.surface.register_settings(settings);
        }
        if N::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            self.normal.register_settings(settings);
        }
        if T::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            self.tangential.register_settings(settings);
        }
    }

    fn load_settings(&mut self, settings: &Settings) -> Result<()> {
        if SurfaceDefault::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            self.surface.load_settings(settings)?;
        }
        if N::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            self.normal.load_settings(settings)?;
        }
        if T::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS) {
            self.tangential.load_settings(settings)?;
        }
        Ok(())
    }

    fn connect_to_properties(&mut self, registry: &mut PropertyRegistry) -> Result<()> {
        if SurfaceDefault::CAPABILITIES.contains(Capabilities::CONNECT_TO_PROPERTIES) {
            self.surface.connect_to_properties(registry)?;
        }
        if N::CAPABILITIES.contains(Capabilities::CONNECT_TO_PROPERTIES) {
            self.normal.connect_to_properties(registry)?;
        }
        if T::CAPABILITIES.contains(Capabilities::CONNECT_TO_PROPERTIES) {
            self.tangential.connect_to_properties(registry)?;
        }
        Ok(())
    }

    #[inline]
    fn collision(
        &mut self,
        cdata: &mut CollisionData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        if SurfaceDefault::CAPABILITIES.contains(Capabilities::COLLISION) {
            self.surface.collision(cdata, i_forces, j_forces);
        }
        if N::CAPABILITIES.contains(Capabilities::COLLISION) {
            self.normal.collision(cdata, i_forces, j_forces);
        }
        if T::CAPABILITIES.contains(Capabilities::COLLISION) {
            self.tangential.collision(cdata, i_forces, j_forces);
        }
    }

    #[inline]
    fn no_collision(
        &mut self,
        cdata: &mut ContactData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        if SurfaceDefault::CAPABILITIES.contains(Capabilities::NO_COLLISION) {
            self.surface.no_collision(cdata, i_forces, j_forces);
        }
        if N::CAPABILITIES.contains(Capabilities::NO_COLLISION) {
            self.normal.no_collision(cdata, i_forces, j_forces);
        }
        if T::CAPABILITIES.contains(Capabilities::NO_COLLISION) {
            self.tangential.no_collision(cdata, i_forces, j_forces);
        }
    }

    fn begin_pass(
        &mut self,
        cdata: &mut CollisionData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        self.surface.begin_pass(cdata, i_forces, j_forces);
        self.normal.begin_pass(cdata, i_forces, j_forces);
        self.tangential.begin_pass(cdata, i_forces, j_forces);
    }

    fn end_pass(
        &mut self,
        cdata: &mut CollisionData,
        i_forces: &mut ForceData,
        j_forces: &mut ForceData,
    ) {
        self.surface.end_pass(cdata, i_forces, j_forces);
        self.normal.end_pass(cdata, i_forces, j_forces);
        self.tangential.end_pass(cdata, i_forces, j_forces);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryLayout, PairContactHistorySetup, WallContactHistorySetup};
    use crate::hysteresis::NormalHookeHysteresis;
    use crate::physics::NormalHooke;
    use crate::tangential::{TangentialHistory, TangentialNoHistory};

    #[test]
    fn test_history_stride_is_sum_of_components() {
        let mut layout = HistoryLayout::new();
        let model = GranularModel::<NormalHookeHysteresis, TangentialHistory>::new(
            &mut PairContactHistorySetup::new(&mut layout),
        );
        assert_eq!(layout.dnum(), 4);
        assert_eq!(layout.offset_of("deltaMax"), Some(model.normal().history_offset()));
        assert_eq!(layout.offset_of("shearx"), Some(model.tangential().history_offset()));
        assert_eq!(model.tangential().history_offset(), 1);

        let mut layout = HistoryLayout::new();
        let _model = GranularModel::<NormalHooke, TangentialNoHistory>::new(
            &mut PairContactHistorySetup::new(&mut layout),
        );
        assert_eq!(layout.dnum(), 0);

        let mut wall = WallContactHistorySetup::new();
        let _model = GranularModel::<NormalHookeHysteresis, TangentialNoHistory>::new(&mut wall);
        assert_eq!(wall.dnum(), 1);
    }

    #[test]
    fn test_capabilities_are_unioned() {
        type Plain = GranularModel<NormalHooke, TangentialNoHistory>;
        type Hysteretic = GranularModel<NormalHookeHysteresis, TangentialNoHistory>;
        assert!(Plain::CAPABILITIES.contains(Capabilities::COLLISION));
        assert!(Plain::CAPABILITIES.contains(Capabilities::NO_COLLISION));
        assert!(!SurfaceDefault::CAPABILITIES.contains(Capabilities::NO_COLLISION));
        assert!(!TangentialNoHistory::CAPABILITIES.contains(Capabilities::NO_COLLISION));
        assert!(Hysteretic::CAPABILITIES.contains(Capabilities::NO_COLLISION));
        assert!(Hysteretic::CAPABILITIES.contains(Capabilities::REGISTER_SETTINGS));
    }

    #[test]
    fn test_style_hashcodes_differ() {
        let a = GranularModel::<NormalHooke, TangentialNoHistory>::STYLE_HASHCODE;
        let b = GranularModel::<NormalHookeHysteresis, TangentialNoHistory>::STYLE_HASHCODE;
        let c = GranularModel::<NormalHookeHysteresis, TangentialHistory>::STYLE_HASHCODE;
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
