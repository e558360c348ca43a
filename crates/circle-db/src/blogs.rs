use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use circle_types::models::{Blog, BlogPost};
use circle_types::{RecordId, now_millis};

use crate::adapter::{Kind, ListMatch};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::sync::Timestamped;
use crate::validate;

impl Store {
    pub(crate) fn create_blog(&self, user_id: &str) -> Result<Blog> {
        let blog = Blog {
            id: user_id.to_string(),
            updated: now_millis(),
            user_id: user_id.to_string(),
            post_ids: Vec::new(),
        };
        self.create(Kind::Blog, &blog.id, &blog)?;
        Ok(blog)
    }

    pub fn get_blog(&self, blog_id: &str) -> Result<Option<Blog>> {
        self.load(Kind::Blog, blog_id)
    }

    pub(crate) fn delete_blog(&self, blog_id: &str) -> Result<bool> {
        let Some(blog) = self.get_blog(blog_id)? else {
            return Ok(false);
        };
        self.documents().delete_many(Kind::BlogPost, &blog.post_ids)?;
        Ok(self.documents().delete(Kind::Blog, blog_id)?)
    }

    fn owned_blog(&self, user_id: &str, blog_id: &str) -> Result<Blog> {
        let blog: Blog = self.require(Kind::Blog, blog_id, "blog")?;
        if blog.user_id != user_id {
            return Err(Error::unauthorized("not the owner of this blog"));
        }
        Ok(blog)
    }

    pub fn insert_blog_post(&self, user_id: &str, blog_id: &str, content: &str) -> Result<BlogPost> {
        validate::content(content)?;
        self.owned_blog(user_id, blog_id)?;

        let now = now_millis();
        let post = BlogPost {
            id: Uuid::new_v4().to_string(),
            updated: now,
            created: now,
            blog_id: blog_id.to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
        };
        self.create(Kind::BlogPost, &post.id, &post)?;
        if !self
            .documents()
            .list_append(Kind::Blog, blog_id, "post_ids", Value::from(post.id.clone()))?
        {
            self.documents().delete(Kind::BlogPost, &post.id)?;
            return Err(Error::NotFound("blog"));
        }

        debug!("Blog {} gained post {}", blog_id, post.id);
        Ok(post)
    }

    /// Replace a post's content. The replacement gets a new id but keeps the
    /// original `created` and its position in the blog.
    pub fn replace_blog_post(
        &self,
        user_id: &str,
        blog_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<BlogPost> {
        validate::content(content)?;
        let blog = self.owned_blog(user_id, blog_id)?;
        if !blog.post_ids.iter().any(|id| id == post_id) {
            return Err(Error::NotFound("post"));
        }
        let old: BlogPost = self.require(Kind::BlogPost, post_id, "post")?;

        let post = BlogPost {
            id: Uuid::new_v4().to_string(),
            updated: now_millis(),
            created: old.created,
            blog_id: blog_id.to_string(),
            user_id: old.user_id.clone(),
            content: content.to_string(),
        };
        self.create(Kind::BlogPost, &post.id, &post)?;

        let swapped = self.update(Kind::Blog, blog_id, |blog: &mut Blog| {
            let Some(slot) = blog.post_ids.iter_mut().find(|id| *id == post_id) else {
                return false;
            };
            *slot = post.id.clone();
            blog.touch();
            true
        })?;
        if !swapped.is_some_and(|blog| blog.post_ids.contains(&post.id)) {
            self.documents().delete(Kind::BlogPost, &post.id)?;
            return Err(Error::NotFound("post"));
        }

        self.documents().delete(Kind::BlogPost, post_id)?;
        debug!("Blog {} replaced post {} with {}", blog_id, post_id, post.id);
        Ok(post)
    }

    pub fn remove_blog_post(&self, user_id: &str, blog_id: &str, post_id: &str) -> Result<()> {
        self.owned_blog(user_id, blog_id)?;
        let removed = self.documents().list_remove(
            Kind::Blog,
            blog_id,
            "post_ids",
            &ListMatch::equals(post_id),
        )?;
        if removed == 0 {
            return Err(Error::NotFound("post"));
        }
        self.documents().delete(Kind::BlogPost, post_id)?;
        Ok(())
    }

    pub fn get_blog_posts(&self, ids: &[RecordId]) -> Result<Vec<BlogPost>> {
        self.load_many(Kind::BlogPost, ids)
    }
}
