//! Static per-platform configuration: which actors fetch what, which
//! columns carry the stable identifiers, and how comment scheduling is
//! pre-filtered. One generic engine reads this instead of three parallel
//! per-platform implementations.

use threadline_common::Platform;

/// Everything the engine needs to know about one platform.
pub struct PlatformSpec {
    pub platform: Platform,

    /// Apify actor that scrapes a profile's posts.
    pub posts_actor: &'static str,
    /// Apify actor that scrapes one post's comment thread. May be the same
    /// actor as `posts_actor` (Twitter and Instagram multiplex one actor).
    pub comments_actor: &'static str,

    /// Identifier column of a post record.
    pub post_id_column: &'static str,
    /// Identifier column of a comment record.
    pub comment_id_column: &'static str,
    /// Column holding the post's permalink; comment fetches take it as input.
    pub post_url_column: &'static str,

    /// Free-text body column of a post record, joined onto its comments.
    pub post_text_column: &'static str,
    /// Author column of a post record, joined onto its comments.
    pub post_author_column: &'static str,

    /// Column reporting how many replies/comments a post has.
    pub reply_count_column: &'static str,
    /// Skip comment fetches for posts whose reported reply count is zero.
    /// Only trustworthy where the posts actor reliably fills the count in.
    pub skip_commentless: bool,
}

const TWITTER: PlatformSpec = PlatformSpec {
    platform: Platform::Twitter,
    posts_actor: "61RPP7dywgiy0JPD0",
    comments_actor: "61RPP7dywgiy0JPD0",
    post_id_column: "id",
    comment_id_column: "id",
    post_url_column: "url",
    post_text_column: "text",
    post_author_column: "author",
    reply_count_column: "replyCount",
    skip_commentless: false,
};

const INSTAGRAM: PlatformSpec = PlatformSpec {
    platform: Platform::Instagram,
    posts_actor: "shu8hvrXbJbY3Eb9W",
    comments_actor: "shu8hvrXbJbY3Eb9W",
    post_id_column: "id",
    comment_id_column: "id",
    post_url_column: "url",
    post_text_column: "caption",
    post_author_column: "ownerUsername",
    reply_count_column: "commentsCount",
    skip_commentless: false,
};

const FACEBOOK: PlatformSpec = PlatformSpec {
    platform: Platform::Facebook,
    posts_actor: "KoJrdxJCTtpon81KY",
    comments_actor: "thDyWzaBBQxt4VOfW",
    post_id_column: "postId",
    comment_id_column: "id",
    post_url_column: "url",
    post_text_column: "text",
    post_author_column: "pageName",
    reply_count_column: "comments",
    skip_commentless: true,
};

/// Look up the spec for a platform.
pub fn spec(platform: Platform) -> &'static PlatformSpec {
    match platform {
        Platform::Twitter => &TWITTER,
        Platform::Instagram => &INSTAGRAM,
        Platform::Facebook => &FACEBOOK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_platform_has_a_spec() {
        for p in Platform::ALL {
            assert_eq!(spec(p).platform, p);
        }
    }

    #[test]
    fn identifier_columns_are_nonempty() {
        for p in Platform::ALL {
            let s = spec(p);
            assert!(!s.post_id_column.is_empty());
            assert!(!s.comment_id_column.is_empty());
            assert!(!s.post_url_column.is_empty());
        }
    }

    #[test]
    fn facebook_uses_a_dedicated_comments_actor() {
        let s = spec(Platform::Facebook);
        assert_ne!(s.posts_actor, s.comments_actor);
    }
}
