use bevy::asset::{AssetLoader, LoadContext, io::Reader};
use bevy::reflect::TypePath;

use super::RigDescription;
use crate::errors::AssetLoaderError;

#[derive(Default, TypePath)]
pub struct RigDescriptionLoader;

impl AssetLoader for RigDescriptionLoader {
    type Asset = RigDescription;
    type Settings = ();
    type Error = AssetLoaderError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes).await?;
        let description: RigDescription = ron::de::from_bytes(&bytes)?;
        Ok(description)
    }

    fn extensions(&self) -> &[&str] {
        &["rig.ron"]
    }
}
