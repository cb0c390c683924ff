//! Ordered movie list of a room
//!
//! A doubly linked list threaded through a slot map: pushes at either end,
//! removals and swaps are O(1) and never shift other entries. A second map
//! gives O(1) lookup by id, a third by pull key.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use crate::models::{BaseMovie, Movie, MovieId, MovieInfo, UserId};
use crate::{Error, Result};

type Slot = u64;

#[derive(Debug)]
struct Node {
    movie: Movie,
    prev: Option<Slot>,
    next: Option<Slot>,
}

#[derive(Debug, Clone, Copy)]
enum End {
    Front,
    Back,
}

#[derive(Debug, Default)]
struct Links {
    nodes: HashMap<Slot, Node>,
    slots: HashMap<MovieId, Slot>,
    pull_keys: HashMap<String, MovieId>,
    head: Option<Slot>,
    tail: Option<Slot>,
    next_slot: Slot,
}

impl Links {
    fn insert(&mut self, movie: Movie, end: End) -> Result<()> {
        if self.slots.contains_key(&movie.id) {
            return Err(Error::AlreadyExists(format!("movie {}", movie.id)));
        }
        let slot = self.next_slot;
        self.next_slot += 1;

        let (prev, next) = match end {
            End::Front => {
                let next = self.head;
                match next.and_then(|s| self.nodes.get_mut(&s)) {
                    Some(node) => node.prev = Some(slot),
                    None => self.tail = Some(slot),
                }
                self.head = Some(slot);
                (None, next)
            }
            End::Back => {
                let prev = self.tail;
                match prev.and_then(|s| self.nodes.get_mut(&s)) {
                    Some(node) => node.next = Some(slot),
                    None => self.head = Some(slot),
                }
                self.tail = Some(slot);
                (prev, None)
            }
        };

        self.slots.insert(movie.id, slot);
        if let Some(key) = &movie.pull_key {
            self.pull_keys.insert(key.clone(), movie.id);
        }
        self.nodes.insert(slot, Node { movie, prev, next });
        Ok(())
    }

    fn remove(&mut self, id: MovieId) -> Option<Movie> {
        let slot = self.slots.remove(&id)?;
        let node = self.nodes.remove(&slot)?;

        match node.prev.and_then(|s| self.nodes.get_mut(&s)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|s| self.nodes.get_mut(&s)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }
        if let Some(key) = &node.movie.pull_key {
            self.pull_keys.remove(key);
        }
        Some(node.movie)
    }

    fn get(&self, id: MovieId) -> Option<&Movie> {
        self.slots
            .get(&id)
            .and_then(|slot| self.nodes.get(slot))
            .map(|node| &node.movie)
    }

    /// Replace the movie stored under `movie.id`, keeping its position.
    fn replace(&mut self, movie: Movie) {
        let Some(node) = self.slots.get(&movie.id).and_then(|s| self.nodes.get_mut(s)) else {
            return;
        };
        if let Some(old) = &node.movie.pull_key {
            self.pull_keys.remove(old);
        }
        if let Some(key) = &movie.pull_key {
            self.pull_keys.insert(key.clone(), movie.id);
        }
        node.movie = movie;
    }

    /// Exchange the movies held by two slots; links stay untouched.
    fn swap(&mut self, a: MovieId, b: MovieId) -> Result<()> {
        let slot_a = *self
            .slots
            .get(&a)
            .ok_or_else(|| Error::NotFound(format!("movie {a}")))?;
        let slot_b = *self
            .slots
            .get(&b)
            .ok_or_else(|| Error::NotFound(format!("movie {b}")))?;
        if slot_a == slot_b {
            return Ok(());
        }

        let Some(mut node_a) = self.nodes.remove(&slot_a) else {
            return Err(Error::Internal(format!("playlist slot of movie {a} is missing")));
        };
        if let Some(node_b) = self.nodes.get_mut(&slot_b) {
            std::mem::swap(&mut node_a.movie, &mut node_b.movie);
        }
        self.nodes.insert(slot_a, node_a);
        self.slots.insert(a, slot_b);
        self.slots.insert(b, slot_a);
        Ok(())
    }

    fn iter(&self) -> impl Iterator<Item = &Movie> + '_ {
        std::iter::successors(self.head, move |slot| self.nodes.get(slot).and_then(|n| n.next))
            .filter_map(move |slot| self.nodes.get(&slot).map(|n| &n.movie))
    }

    fn take_all(&mut self) -> Vec<Movie> {
        let order: Vec<Slot> =
            std::iter::successors(self.head, |slot| self.nodes.get(slot).and_then(|n| n.next))
                .collect();
        let mut nodes = std::mem::take(&mut self.nodes);
        *self = Self {
            next_slot: self.next_slot,
            ..Self::default()
        };
        order
            .into_iter()
            .filter_map(|slot| nodes.remove(&slot))
            .map(|node| node.movie)
            .collect()
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Default)]
pub struct Playlist {
    links: RwLock<Links>,
}

impl Playlist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&self, movie: Movie) -> Result<()> {
        self.links.write().insert(movie, End::Back)
    }

    pub fn push_front(&self, movie: Movie) -> Result<()> {
        self.links.write().insert(movie, End::Front)
    }

    /// Append `movies` in order, all or none. Fails `AlreadyExists` when any
    /// id is already queued or repeated within the batch.
    pub fn push_back_many(&self, movies: Vec<Movie>) -> Result<()> {
        let mut links = self.links.write();
        let mut seen = HashSet::with_capacity(movies.len());
        if let Some(dup) = movies
            .iter()
            .find(|movie| links.slots.contains_key(&movie.id) || !seen.insert(movie.id))
        {
            return Err(Error::AlreadyExists(format!("movie {}", dup.id)));
        }
        for movie in movies {
            links.insert(movie, End::Back)?;
        }
        Ok(())
    }

    pub fn get(&self, id: MovieId) -> Result<Movie> {
        self.links
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("movie {id}")))
    }

    pub fn get_by_pull_key(&self, pull_key: &str) -> Result<Movie> {
        let links = self.links.read();
        links
            .pull_keys
            .get(pull_key)
            .and_then(|id| links.get(*id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("movie with pull key {pull_key}")))
    }

    #[must_use]
    pub fn contains(&self, id: MovieId) -> bool {
        self.links.read().slots.contains_key(&id)
    }

    /// Replace the base info of a movie in place. Returns the movie before
    /// and after the edit.
    pub fn edit(&self, id: MovieId, base: BaseMovie) -> Result<(Movie, Movie)> {
        self.edit_with(id, base, |_, _| Ok(()))
    }

    /// Like [`edit`](Self::edit), but `commit` sees the old and new movie
    /// under the write lock and can veto the edit by returning an error.
    pub fn edit_with<F>(&self, id: MovieId, base: BaseMovie, commit: F) -> Result<(Movie, Movie)>
    where
        F: FnOnce(&Movie, &Movie) -> Result<()>,
    {
        let mut links = self.links.write();
        let before = links
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("movie {id}")))?;
        let mut after = before.clone();
        after.edit(base)?;
        commit(&before, &after)?;
        links.replace(after.clone());
        Ok((before, after))
    }

    /// Remove every movie in `ids`, or none of them.
    pub fn delete_many(&self, ids: &[MovieId]) -> Result<Vec<Movie>> {
        let mut links = self.links.write();
        if let Some(missing) = ids.iter().find(|id| !links.slots.contains_key(*id)) {
            return Err(Error::NotFound(format!("movie {missing}")));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| links.remove(*id))
            .collect())
    }

    /// Exchange the positions of two movies.
    pub fn swap(&self, a: MovieId, b: MovieId) -> Result<()> {
        self.links.write().swap(a, b)
    }

    /// Ordered presentation copies for `viewer`, with creators resolved by
    /// `resolve_creator`.
    pub fn snapshot<F>(&self, viewer: Option<&UserId>, resolve_creator: F) -> Vec<MovieInfo>
    where
        F: Fn(&UserId) -> Option<String>,
    {
        self.links
            .read()
            .iter()
            .map(|movie| movie.to_info(resolve_creator(&movie.creator_id), viewer))
            .collect()
    }

    /// One page of the snapshot (1-based `page`) and the total count.
    pub fn page<F>(
        &self,
        page: usize,
        page_size: usize,
        viewer: Option<&UserId>,
        resolve_creator: F,
    ) -> (Vec<MovieInfo>, usize)
    where
        F: Fn(&UserId) -> Option<String>,
    {
        let links = self.links.read();
        let skip = page.saturating_sub(1).saturating_mul(page_size);
        let items = links
            .iter()
            .skip(skip)
            .take(page_size)
            .map(|movie| movie.to_info(resolve_creator(&movie.creator_id), viewer))
            .collect();
        (items, links.len())
    }

    /// Raw movies in order, for persistence.
    #[must_use]
    pub fn movies(&self) -> Vec<Movie> {
        self.links.read().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.links.write().take_all();
    }

    /// Atomically remove and return every movie, in order.
    pub fn get_and_clear(&self) -> Vec<Movie> {
        self.links.write().take_all()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{live_movie, movie_fixture};

    fn ids(playlist: &Playlist) -> Vec<u64> {
        playlist.movies().iter().map(|m| m.id.get()).collect()
    }

    fn filled(n: u64) -> Playlist {
        let playlist = Playlist::new();
        for id in 1..=n {
            playlist.push_back(movie_fixture(id)).unwrap();
        }
        playlist
    }

    #[test]
    fn test_push_back_and_front_order() {
        let playlist = filled(2);
        playlist.push_front(movie_fixture(3)).unwrap();

        assert_eq!(ids(&playlist), vec![3, 1, 2]);
        assert_eq!(playlist.len(), 3);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let playlist = filled(2);

        assert!(matches!(
            playlist.push_back(movie_fixture(1)),
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            playlist.push_front(movie_fixture(2)),
            Err(Error::AlreadyExists(_))
        ));
        assert_eq!(ids(&playlist), vec![1, 2]);
    }

    #[test]
    fn test_get_and_pull_key_lookup() {
        let playlist = filled(1);
        let live = live_movie(2);
        let key = live.pull_key.clone().unwrap();
        playlist.push_back(live).unwrap();

        assert_eq!(playlist.get(MovieId(1)).unwrap().id, MovieId(1));
        assert!(matches!(playlist.get(MovieId(9)), Err(Error::NotFound(_))));
        assert_eq!(playlist.get_by_pull_key(&key).unwrap().id, MovieId(2));
        assert!(playlist.get_by_pull_key("missing").is_err());
    }

    #[test]
    fn test_swap_keeps_others_in_place() {
        let playlist = filled(5);
        playlist.swap(MovieId(2), MovieId(4)).unwrap();

        assert_eq!(ids(&playlist), vec![1, 4, 3, 2, 5]);

        let snapshot: Vec<u64> = playlist
            .snapshot(None, |_| None)
            .iter()
            .map(|m| m.id.get())
            .collect();
        assert_eq!(snapshot, vec![1, 4, 3, 2, 5]);
    }

    #[test]
    fn test_swap_missing_is_not_found() {
        let playlist = filled(2);
        assert!(matches!(
            playlist.swap(MovieId(1), MovieId(7)),
            Err(Error::NotFound(_))
        ));
        assert_eq!(ids(&playlist), vec![1, 2]);
    }

    #[test]
    fn test_delete_many_is_all_or_nothing() {
        let playlist = filled(4);

        let result = playlist.delete_many(&[MovieId(1), MovieId(99), MovieId(3)]);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(ids(&playlist), vec![1, 2, 3, 4]);

        let removed = playlist
            .delete_many(&[MovieId(3), MovieId(1), MovieId(3)])
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(ids(&playlist), vec![2, 4]);
    }

    #[test]
    fn test_snapshot_resolves_creator() {
        let playlist = filled(2);
        let snapshot = playlist.snapshot(None, |_| Some("alice".to_string()));
        assert!(snapshot.iter().all(|m| m.creator == "alice"));
    }

    #[test]
    fn test_page() {
        let playlist = filled(5);

        let (items, total) = playlist.page(2, 2, None, |_| None);
        assert_eq!(total, 5);
        assert_eq!(items.iter().map(|m| m.id.get()).collect::<Vec<_>>(), vec![3, 4]);

        let (items, _) = playlist.page(4, 2, None, |_| None);
        assert!(items.is_empty());
    }

    #[test]
    fn test_edit_in_place() {
        let playlist = filled(3);
        let mut base = playlist.get(MovieId(2)).unwrap().base;
        base.name = "renamed".to_string();

        let (before, after) = playlist.edit(MovieId(2), base).unwrap();
        assert_ne!(before.base.name, after.base.name);
        assert_eq!(ids(&playlist), vec![1, 2, 3]);
        assert_eq!(playlist.get(MovieId(2)).unwrap().base.name, "renamed");

        let mut invalid = after.base;
        invalid.url = "not a url".to_string();
        assert!(playlist.edit(MovieId(2), invalid).is_err());
        assert_eq!(playlist.get(MovieId(2)).unwrap().base.name, "renamed");
    }

    #[test]
    fn test_get_and_clear() {
        let playlist = filled(3);
        let removed = playlist.get_and_clear();

        assert_eq!(removed.iter().map(|m| m.id.get()).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(playlist.is_empty());

        let playlist = filled(2);
        playlist.clear();
        assert_eq!(playlist.len(), 0);
    }

    #[test]
    fn test_links_survive_mixed_operations() {
        let playlist = filled(3);
        playlist.push_front(movie_fixture(4)).unwrap();
        playlist.push_back(movie_fixture(5)).unwrap();
        assert_eq!(ids(&playlist), vec![4, 1, 2, 3, 5]);

        // head, tail and middle removals
        playlist.delete_many(&[MovieId(4)]).unwrap();
        playlist.delete_many(&[MovieId(5)]).unwrap();
        playlist.delete_many(&[MovieId(2)]).unwrap();
        assert_eq!(ids(&playlist), vec![1, 3]);

        playlist.push_front(movie_fixture(6)).unwrap();
        playlist.push_back(movie_fixture(7)).unwrap();
        assert_eq!(ids(&playlist), vec![6, 1, 3, 7]);

        // adjacent, then head with tail
        playlist.swap(MovieId(1), MovieId(3)).unwrap();
        assert_eq!(ids(&playlist), vec![6, 3, 1, 7]);
        playlist.swap(MovieId(6), MovieId(7)).unwrap();
        assert_eq!(ids(&playlist), vec![7, 3, 1, 6]);

        // positions follow the swapped movies
        playlist.delete_many(&[MovieId(7), MovieId(6)]).unwrap();
        assert_eq!(ids(&playlist), vec![3, 1]);
        playlist.push_front(movie_fixture(8)).unwrap();
        assert_eq!(ids(&playlist), vec![8, 3, 1]);

        playlist.delete_many(&[MovieId(8), MovieId(3), MovieId(1)]).unwrap();
        assert!(playlist.is_empty());
        playlist.push_back(movie_fixture(9)).unwrap();
        playlist.push_front(movie_fixture(10)).unwrap();
        assert_eq!(ids(&playlist), vec![10, 9]);
    }

    #[test]
    fn test_swap_with_itself_is_noop() {
        let playlist = filled(3);
        playlist.swap(MovieId(2), MovieId(2)).unwrap();
        assert_eq!(ids(&playlist), vec![1, 2, 3]);
    }

    #[test]
    fn test_pull_key_index_tracks_edits_and_deletes() {
        let playlist = Playlist::new();
        let live = live_movie(1);
        let key = live.pull_key.clone().unwrap();
        playlist.push_back(live).unwrap();

        let mut base = playlist.get(MovieId(1)).unwrap().base;
        base.live = false;
        base.proxy = false;
        base.url = "https://media.example.com/vod.mp4".to_string();
        let (_, after) = playlist.edit(MovieId(1), base).unwrap();
        assert!(after.pull_key.is_none());
        assert!(playlist.get_by_pull_key(&key).is_err());

        let live = live_movie(2);
        let key = live.pull_key.clone().unwrap();
        playlist.push_back(live).unwrap();
        playlist.delete_many(&[MovieId(2)]).unwrap();
        assert!(playlist.get_by_pull_key(&key).is_err());
    }

    #[test]
    fn test_edit_with_veto_keeps_old_movie() {
        let playlist = filled(2);
        let mut base = playlist.get(MovieId(1)).unwrap().base;
        base.name = "renamed".to_string();

        let result = playlist.edit_with(MovieId(1), base.clone(), |before, after| {
            assert_eq!(before.base.name, "movie-1");
            assert_eq!(after.base.name, "renamed");
            Err(Error::Internal("relay down".to_string()))
        });
        assert!(matches!(result, Err(Error::Internal(_))));
        assert_eq!(playlist.get(MovieId(1)).unwrap().base.name, "movie-1");

        playlist.edit_with(MovieId(1), base, |_, _| Ok(())).unwrap();
        assert_eq!(playlist.get(MovieId(1)).unwrap().base.name, "renamed");
    }

    #[test]
    fn test_push_back_many_is_all_or_nothing() {
        let playlist = filled(2);

        let result = playlist.push_back_many(vec![movie_fixture(3), movie_fixture(1)]);
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        let result = playlist.push_back_many(vec![movie_fixture(4), movie_fixture(4)]);
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        assert_eq!(ids(&playlist), vec![1, 2]);

        playlist
            .push_back_many(vec![movie_fixture(3), movie_fixture(4)])
            .unwrap();
        assert_eq!(ids(&playlist), vec![1, 2, 3, 4]);
    }
}
