//! Sample articles shown when no store has any content. Never persisted.

use crate::model::{Article, Category};

pub const SEED_IDS: [&str; 2] = ["default-1", "default-2"];

/// The two built-in articles, timestamped just before `now`.
pub fn default_articles(now: i64) -> Vec<Article> {
    vec![
        Article {
            id: SEED_IDS[0].to_string(),
            title: "מהפכת הבינה המלאכותית: האם הטכנולוגיה בדרך להחליף את העיתונאים?".to_string(),
            subtitle: "מחקר חדש חושף כיצד כלי ה-AI משנים את פני המדיה העולמית.".to_string(),
            content: "עולם העיתונות עובר טלטלה משמעותית בשנה האחרונה. עם כניסתם של מודלים שפתיים מתקדמים, מערכות חדשות רבות החלו להטמיע כלים אוטומטיים ליצירת תוכן.".to_string(),
            author: "מערכת חדשות אמת".to_string(),
            category: Category::Technology,
            image_url: "https://images.unsplash.com/photo-1677442136019-21780ecad995?auto=format&fit=crop&q=80&w=1200".to_string(),
            created_at: now - 10_000,
            is_breaking: Some(false),
            breaking_expiry: None,
            comments: Vec::new(),
        },
        Article {
            id: SEED_IDS[1].to_string(),
            title: "משבר הדיור: האם המחירים בדרך לירידה משמעותית?".to_string(),
            subtitle: "נתונים חדשים מראים האטה בשוק הנדל\"ן המקומי.".to_string(),
            content: "אחרי שנים של עליות בלתי פוסקות, נראה כי שוק הנדל\"ן מתחיל להראות סימני התקררות.".to_string(),
            author: "אבי כהן".to_string(),
            category: Category::Economy,
            image_url: "https://images.unsplash.com/photo-1560518883-ce09059eeffa?auto=format&fit=crop&q=80&w=800".to_string(),
            created_at: now - 50_000,
            is_breaking: Some(false),
            breaking_expiry: None,
            comments: Vec::new(),
        },
    ]
}

pub fn is_seed(id: &str) -> bool {
    SEED_IDS.contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeds_newest_first_and_not_breaking() {
        let seeds = default_articles(1_000_000);
        assert_eq!(seeds.len(), 2);
        assert!(seeds[0].created_at > seeds[1].created_at);
        assert!(seeds.iter().all(|a| !a.is_breaking_at(1_000_000)));
        assert!(is_seed("default-2"));
        assert!(!is_seed("k3j9x0q2a"));
    }
}
