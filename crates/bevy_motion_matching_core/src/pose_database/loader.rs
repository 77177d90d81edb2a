use bevy::{
    asset::{AssetLoader, LoadContext, io::Reader},
    reflect::TypePath,
};

use super::{PoseDatabase, serial::PoseDatabaseSerial};
use crate::errors::AssetLoaderError;

#[derive(Default, TypePath)]
pub struct PoseDatabaseLoader;

impl AssetLoader for PoseDatabaseLoader {
    type Asset = PoseDatabase;
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
        let serial: PoseDatabaseSerial = ron::de::from_bytes(&bytes)?;
        let database = PoseDatabase::from(serial);
        database.validate()?;

        Ok(database)
    }

    fn extensions(&self) -> &[&str] {
        &["posedb.ron"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose_database::test_support::linear_database;

    #[test]
    fn test_serial_round_trip_keeps_groups() {
        use crate::pose_database::distance_match::{
            DistanceCurve, DistanceMatchBasis, DistanceMatchGroup, DistanceMatchIdentifier,
            DistanceMatchSection, DistanceMatchType,
        };

        let mut db = linear_database(4, 2, 1);
        let identifier =
            DistanceMatchIdentifier::new(DistanceMatchType::Backward, DistanceMatchBasis::Positional);
        db.distance_match_groups.insert(
            identifier,
            DistanceMatchGroup {
                identifier,
                sections: vec![DistanceMatchSection {
                    start_pose: 0,
                    end_pose: 3,
                    start_time: 0.0,
                    end_time: 0.3,
                    curve: DistanceCurve::from_pairs([(0.0, 30.0), (0.3, 0.0)]),
                }],
            },
        );

        let text = ron::ser::to_string(&PoseDatabaseSerial::from(&db)).unwrap();
        let serial: PoseDatabaseSerial = ron::de::from_str(&text).unwrap();
        let loaded = PoseDatabase::from(serial);

        assert_eq!(loaded.poses, db.poses);
        assert_eq!(loaded.distance_match_groups, db.distance_match_groups);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_minimal_ron_uses_defaults() {
        let text = r#"(
            pose_interval: 0.1,
            trajectory_times: [0.5],
            pose_bones: [],
            poses: [
                (
                    id: 0,
                    source_index: 0,
                    time: 0.0,
                    trajectory: [(position: (0.0, 0.0, 0.0), facing: 0.0)],
                    joints: [],
                    local_velocity: (0.0, 0.0, 0.0),
                    rotational_velocity: 0.0,
                    last_pose: None,
                    next_pose: None,
                ),
            ],
            sequences: [(name: "idle", duration: 1.0, looping: true)],
        )"#;

        let serial: PoseDatabaseSerial = ron::de::from_str(text).unwrap();
        let db = PoseDatabase::from(serial);

        assert_eq!(db.poses[0].favour, 1.0);
        assert_eq!(db.sequences[0].play_rate, 1.0);
        assert!(db.validate().is_ok());
    }
}
