use super::CourseRepository;
use crate::models::{Course, CourseUpdate};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockCourseRepository {
    courses: Arc<Mutex<HashMap<String, Course>>>,
    updates: Arc<Mutex<Vec<(String, CourseUpdate)>>>,
    fail_updates: Arc<Mutex<bool>>,
}

impl MockCourseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(self, course: Course) -> Self {
        self.courses
            .lock()
            .unwrap()
            .insert(course.id.clone(), course);
        self
    }

    pub fn with_update_failure(self, fail: bool) -> Self {
        *self.fail_updates.lock().unwrap() = fail;
        self
    }

    pub fn course(&self, course_id: &str) -> Option<Course> {
        self.courses.lock().unwrap().get(course_id).cloned()
    }

    pub fn updates(&self) -> Vec<(String, CourseUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    fn apply(course: &mut Course, field: &str, value: Option<String>) {
        match field {
            "image" => course.image = value,
            "imageFileName" => course.image_file_name = value,
            "imageStoragePath" => course.image_storage_path = value,
            "thumbnailUrl" => course.thumbnail_url = value,
            "bannerImage" => course.banner_image = value,
            "bannerStoragePath" => course.banner_storage_path = value,
            _ => {}
        }
    }
}

#[async_trait]
impl CourseRepository for MockCourseRepository {
    async fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        Ok(self.courses.lock().unwrap().get(course_id).cloned())
    }

    async fn update_course(&self, course_id: &str, update: &CourseUpdate) -> Result<()> {
        if *self.fail_updates.lock().unwrap() {
            return Err(Error::Firestore("Mock update failure".to_string()));
        }

        let mut courses = self.courses.lock().unwrap();
        let course = courses
            .get_mut(course_id)
            .ok_or_else(|| Error::NotFound(format!("Course {}", course_id)))?;
        for (field, value) in &update.set {
            Self::apply(course, field, Some(value.clone()));
        }
        for field in &update.remove {
            Self::apply(course, field, None);
        }

        self.updates
            .lock()
            .unwrap()
            .push((course_id.to_string(), update.clone()));
        Ok(())
    }
}
