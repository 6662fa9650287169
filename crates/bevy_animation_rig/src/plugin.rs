use bevy::{
    app::{App, Plugin},
    asset::{AssetApp, AssetPlugin},
};
use bevy_animation_rig_constraints::plugin::RigConstraintsPlugin;

use crate::{
    asset::{RigDescription, RigDescriptionLoader},
    bake::BakeSettings,
};

/// Adds rig descriptions and every builtin constraint kind to an app
#[derive(Default)]
pub struct AnimationRigPlugin;

impl Plugin for AnimationRigPlugin {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<RigConstraintsPlugin>() {
            app.add_plugins(RigConstraintsPlugin);
        }
        self.register_types(app);
        if app.is_plugin_added::<AssetPlugin>() {
            app //
                .init_asset::<RigDescription>()
                .init_asset_loader::<RigDescriptionLoader>()
                .register_asset_reflect::<RigDescription>();
        }
    }
}

impl AnimationRigPlugin {
    fn register_types(&self, app: &mut App) {
        app //
            .register_type::<RigDescription>()
            .register_type::<BakeSettings>();
    }
}
