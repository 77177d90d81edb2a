use bevy::{
    asset::{AssetLoader, LoadContext, io::Reader},
    reflect::TypePath,
};

use super::MotionMatchingSettings;
use crate::errors::AssetLoaderError;

#[derive(Default, TypePath)]
pub struct MotionMatchingSettingsLoader;

impl AssetLoader for MotionMatchingSettingsLoader {
    type Asset = MotionMatchingSettings;
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
        let settings: MotionMatchingSettings = ron::de::from_bytes(&bytes)?;

        Ok(settings)
    }

    fn extensions(&self) -> &[&str] {
        &["mmsettings.ron"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{PoseMatchMethod, TransitionMethod};

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings: MotionMatchingSettings = ron::de::from_str(
            "(blend_time: 0.2, transition_method: Blend, pose_match_method: Linear)",
        )
        .unwrap();

        assert_eq!(settings.blend_time, 0.2);
        assert_eq!(settings.transition_method, TransitionMethod::Blend);
        assert_eq!(settings.pose_match_method, PoseMatchMethod::Linear);
        assert_eq!(settings.update_interval, 0.1);
        assert_eq!(settings.current_pose_favour, 0.95);
        assert_eq!(settings.winner_suppression.time_threshold, 0.25);
    }
}
