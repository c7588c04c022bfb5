use crate::project::ProjectDraft;

pub fn read_draft_json(path: &str) -> std::io::Result<ProjectDraft> {
    let contents = crate::io::read_to_string(path)?;
    let draft: ProjectDraft = serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(draft)
}

pub fn write_draft_json(path: &str, draft: &ProjectDraft) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(draft).map_err(std::io::Error::other)?;
    crate::io::write_string(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use tempfile::tempdir;

    #[test]
    fn draft_survives_a_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("draft.json");
        let path = path.to_str().unwrap();
        let mut draft = ProjectDraft::new("Canyon View", 120, 2030);
        draft.pipeline_added = true;
        draft.points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        write_draft_json(path, &draft).unwrap();
        assert_eq!(read_draft_json(path).unwrap(), draft);
    }

    #[test]
    fn flags_and_points_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("draft.json");
        let path = path.to_str().unwrap();
        crate::io::write_string(
            path,
            r#"{"name":"Minimal","unit_count":10,"build_year":2026}"#,
        )
        .unwrap();
        let draft = read_draft_json(path).unwrap();
        assert!(!draft.greywater_recycling);
        assert!(draft.points.is_empty());
    }

    #[test]
    fn garbage_is_invalid_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("draft.json");
        let path = path.to_str().unwrap();
        crate::io::write_string(path, "not json").unwrap();
        let err = read_draft_json(path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
